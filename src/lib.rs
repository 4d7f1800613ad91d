use {
    anyhow::{Context, Error, anyhow, bail, ensure},
    async_trait::async_trait,
    bitcoin::{
        Amount, BlockHash, CompactTarget, OutPoint, ScriptBuf, Sequence, Target, Transaction,
        TxIn, TxMerkleNode, TxOut, Txid, VarInt, Witness,
        consensus,
        hashes::{Hash, sha256, sha256d},
        locktime::absolute::LockTime,
        script::write_scriptint,
    },
    block_template::BlockTemplate,
    clap::Parser,
    coinbase_builder::CoinbaseBuilder,
    daemon::{BlockInfo, Daemon, TransactionInfo},
    dashmap::DashMap,
    derive_more::Display,
    event::{Event, EventBus},
    futures::{sink::SinkExt, stream::StreamExt},
    hash_algorithm::{CoinbaseHasher, HashAlgorithm},
    job::Job,
    job_tracker::JobTracker,
    parking_lot::Mutex,
    primitive_types::U256,
    ring_buffer::RingBuffer,
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::{Value, json},
    session::{MinerSession, MinerSnapshot},
    settings::{CoinOptions, PoolConfig, VardiffOptions},
    share::{FoundBlock, Share, ShareError},
    share_manager::ShareManager,
    snafu::Snafu,
    std::{
        collections::{BTreeMap, HashSet, VecDeque},
        env,
        fmt::{self, Display, Formatter},
        net::SocketAddr,
        process,
        sync::{
            Arc,
            atomic::{AtomicU32, AtomicU64, Ordering},
        },
        time::{Duration, Instant, SystemTime, UNIX_EPOCH},
    },
    storage::Storage,
    stratum::{
        Authorize, DIFFICULTY_1_TARGET, Difficulty, Extranonce, Id, JobId,
        MAX_MESSAGE_SIZE, MerkleTree, Message, Notify, Ntime, Ratio, SetDifficulty, SetTarget,
        ShowMessage, StratumError, Submit, Subscribe, SubscribeResult, difficulty_from_target,
    },
    tokio::{
        io::{AsyncRead, AsyncWrite},
        net::TcpListener,
        runtime::Runtime,
        sync::{Semaphore, mpsc},
        task::JoinSet,
        time::{MissedTickBehavior, interval, timeout},
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
    vardiff::VardiffManager,
};

pub use {
    block_template::TemplateTransaction,
    connection::Connection,
    daemon::{RpcDaemon, RpcError, TransactionOutput},
    event::Event as PoolEvent,
    hash_algorithm::Sha256d,
    pool::Pool,
    serializer::{
        ScriptError, script_from_address, script_from_public_key, serialize_block,
        serialize_coinbase, serialize_header,
    },
    storage::{FileStorage, NullStorage},
};

mod block_template;
mod coinbase_builder;
mod connection;
mod daemon;
mod event;
mod hash_algorithm;
mod job;
mod job_tracker;
mod logs;
mod pool;
mod ring_buffer;
mod serializer;
mod session;
mod settings;
mod share;
mod share_manager;
mod signal;
mod storage;
mod vardiff;

#[cfg(test)]
mod fixtures;

pub const ENONCE1_SIZE: usize = 4;
pub const MIN_ENONCE2_SIZE: usize = 2;
pub const MAX_ENONCE2_SIZE: usize = 32;
/// Seconds a submitted nTime may run ahead of the clock, the network's two hour limit.
pub const MAX_NTIME_OFFSET: u64 = 7200;
pub const SUBSCRIPTION_ID: &str = "5ba5e";

type Result<T = (), E = Error> = std::result::Result<T, E>;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}

pub fn main() {
    let _guard = logs::init();

    let config = PoolConfig::parse();

    Runtime::new()
        .expect("Failed to create tokio runtime")
        .block_on(async {
            let cancel_token = signal::setup_signal_handler();

            match pool::run(config, cancel_token).await {
                Err(err) => {
                    eprintln!("error: {err}");

                    for (i, cause) in err.chain().skip(1).enumerate() {
                        if i == 0 {
                            eprintln!();
                            eprintln!("because:");
                        }
                        eprintln!("- {cause}");
                    }

                    if env::var_os("RUST_BACKTRACE")
                        .map(|val| val == "1")
                        .unwrap_or_default()
                    {
                        eprintln!();
                        eprintln!("{}", err.backtrace());
                    }
                    process::exit(1);
                }
                Ok(_) => {
                    process::exit(0);
                }
            }
        });
}
