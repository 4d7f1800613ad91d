use super::*;

#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct BlockTemplate {
    #[serde(deserialize_with = "compact_from_hex")]
    pub bits: CompactTarget,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: BlockHash,
    #[serde(rename = "curtime")]
    pub current_time: u32,
    pub height: u64,
    pub version: i32,
    #[serde(default, deserialize_with = "target_from_hex")]
    pub target: Option<U256>,
    #[serde(default)]
    pub transactions: Vec<TemplateTransaction>,
    #[serde(default)]
    pub default_witness_commitment: Option<ScriptBuf>,
    #[serde(default)]
    pub coinbaseaux: BTreeMap<String, String>,
    #[serde(
        rename = "coinbasevalue",
        with = "bitcoin::amount::serde::as_sat",
        default
    )]
    pub coinbase_value: Amount,
    /// Extra 32-byte header field some coins place after the merkle root.
    #[serde(rename = "finalsaplingroothash", default)]
    pub reserved: Option<sha256d::Hash>,
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct TemplateTransaction {
    #[serde(deserialize_with = "bytes_from_hex")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub txid: Option<Txid>,
    pub hash: Txid,
}

impl TemplateTransaction {
    /// Daemons that predate segwit only report `hash`, which is then the txid.
    pub fn txid(&self) -> Txid {
        self.txid.unwrap_or(self.hash)
    }
}

impl BlockTemplate {
    /// Network target, preferring the explicit `target` over the compact `bits`.
    pub fn target(&self) -> U256 {
        self.target.unwrap_or_else(|| {
            U256::from_big_endian(&Target::from_compact(self.bits).to_be_bytes())
        })
    }

    pub fn difficulty(&self) -> f64 {
        difficulty_from_target(self.target())
    }

    pub fn txids(&self) -> Vec<Txid> {
        self.transactions
            .iter()
            .map(TemplateTransaction::txid)
            .collect()
    }
}

fn compact_from_hex<'de, D>(d: D) -> Result<CompactTarget, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    u32::from_str_radix(&s, 16)
        .map(CompactTarget::from_consensus)
        .map_err(serde::de::Error::custom)
}

fn target_from_hex<'de, D>(d: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = Option::<String>::deserialize(d)? else {
        return Ok(None);
    };

    let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;

    if bytes.len() > 32 {
        return Err(serde::de::Error::custom(format!(
            "target `{s}` is longer than 32 bytes"
        )));
    }

    Ok(Some(U256::from_big_endian(&bytes)))
}

fn bytes_from_hex<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    hex::decode(&s).map_err(serde::de::Error::custom)
}
