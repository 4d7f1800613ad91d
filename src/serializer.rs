use {
    super::*,
    bitcoin::{
        PubkeyHash, base58,
        opcodes::all::OP_CHECKSIG,
        script::{Builder, PushBytesBuf},
    },
};

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ScriptError {
    #[snafu(display("invalid address `{address}`"))]
    InvalidAddress { address: String },
    #[snafu(display("invalid public key `{key}`"))]
    InvalidPublicKey { key: String },
}

/// Pay-to-pubkey-hash script for a Base58Check address with a one or two byte version
/// prefix.
pub fn script_from_address(address: &str) -> Result<ScriptBuf, ScriptError> {
    let invalid = || ScriptError::InvalidAddress {
        address: address.into(),
    };

    let payload = base58::decode_check(address).map_err(|_| invalid())?;

    if !matches!(payload.len(), 21 | 22) {
        return Err(invalid());
    }

    let hash = <[u8; 20]>::try_from(&payload[payload.len() - 20..]).map_err(|_| invalid())?;

    Ok(ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(hash)))
}

/// Pay-to-pubkey script for a hex encoded compressed public key.
pub fn script_from_public_key(key: &str) -> Result<ScriptBuf, ScriptError> {
    let invalid = || ScriptError::InvalidPublicKey { key: key.into() };

    let bytes = hex::decode(key).map_err(|_| invalid())?;

    if bytes.len() != 33 {
        return Err(invalid());
    }

    let push = PushBytesBuf::try_from(bytes).map_err(|_| invalid())?;

    Ok(Builder::new()
        .push_slice(push)
        .push_opcode(OP_CHECKSIG)
        .into_script())
}

pub fn serialize_coinbase(job: &Job, extranonce1: &Extranonce) -> Vec<u8> {
    let mut coinbase =
        Vec::with_capacity(job.coinb1().len() + extranonce1.len() + job.coinb2().len());
    coinbase.extend_from_slice(job.coinb1());
    coinbase.extend_from_slice(extranonce1.as_bytes());
    coinbase.extend_from_slice(job.coinb2());
    coinbase
}

/// `version | prevhash | merkle root | reserved | ntime | nbits | nonce | solution`, all
/// little-endian. The solution already carries its compact-size length prefix.
pub fn serialize_header(
    job: &Job,
    merkle_root: TxMerkleNode,
    nonce: &[u8],
    ntime: u32,
    solution: &[u8],
) -> Vec<u8> {
    let template = job.template();

    let mut header = Vec::with_capacity(140 + nonce.len() + solution.len());
    header.extend_from_slice(&template.version.to_le_bytes());
    header.extend_from_slice(template.previous_block_hash.as_byte_array());
    header.extend_from_slice(merkle_root.as_byte_array());
    header.extend_from_slice(&job.reserved());
    header.extend_from_slice(&ntime.to_le_bytes());
    header.extend_from_slice(&template.bits.to_consensus().to_le_bytes());
    header.extend_from_slice(nonce);
    header.extend_from_slice(solution);
    header
}

pub fn serialize_block(
    job: &Job,
    header: &[u8],
    coinbase: &[u8],
    proof_of_stake_hybrid: bool,
) -> Vec<u8> {
    let transactions = &job.template().transactions;

    let mut block = Vec::with_capacity(
        header.len()
            + 9
            + coinbase.len()
            + transactions.iter().map(|tx| tx.data.len()).sum::<usize>()
            + 1,
    );

    block.extend_from_slice(header);
    block.extend_from_slice(&consensus::serialize(&VarInt(
        transactions.len() as u64 + 1,
    )));
    block.extend_from_slice(coinbase);

    for transaction in transactions {
        block.extend_from_slice(&transaction.data);
    }

    if proof_of_stake_hybrid {
        block.push(0);
    }

    block
}
