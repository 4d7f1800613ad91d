use {
    bitcoin::{
        BlockHash, CompactTarget, Target, TxMerkleNode, Txid,
        consensus::Encodable,
        hashes::Hash,
    },
    byteorder::{ByteOrder, LittleEndian},
    derive_more::Display,
    error::HexSnafu,
    primitive_types::{U256, U512},
    serde::{
        Deserialize, Serialize, Serializer,
        de::{self, Deserializer},
        ser::SerializeSeq,
    },
    serde_json::Value,
    serde_with::{DeserializeFromStr, SerializeDisplay},
    snafu::{ResultExt, Snafu},
    std::{
        cmp::Ordering,
        fmt::{self, Display, Formatter},
        str::FromStr,
        sync::LazyLock,
    },
};

pub use {
    authorize::Authorize,
    difficulty::{DIFFICULTY_1_TARGET, Difficulty, difficulty_from_target},
    error::{InternalError, JsonRpcError, Result, StratumError},
    extranonce::Extranonce,
    job_id::JobId,
    merkle::MerkleTree,
    message::{Id, Message},
    notify::Notify,
    ntime::Ntime,
    ratio::Ratio,
    set_difficulty::SetDifficulty,
    set_target::SetTarget,
    show_message::ShowMessage,
    submit::Submit,
    subscribe::{Subscribe, SubscribeResult},
};

pub const MAX_MESSAGE_SIZE: usize = 32 * 1024;

mod authorize;
mod difficulty;
mod error;
mod extranonce;
mod job_id;
mod merkle;
mod message;
mod notify;
mod ntime;
mod ratio;
mod set_difficulty;
mod set_target;
mod show_message;
mod submit;
mod subscribe;

/// String view of positional params. Non-string entries become `None` and a params value
/// that is not an array yields nothing.
fn positional_strings(value: &Value) -> Vec<Option<String>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}
