use super::*;

/// Pool or miner nonce material, carried on the wire as plain hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct Extranonce(Vec<u8>);

impl Extranonce {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self(hex::decode(s).context(HexSnafu { input: s })?))
    }

    /// Bytes in reverse order, the way the submitted extranonce2 enters the header nonce.
    pub fn reversed(&self) -> Vec<u8> {
        self.0.iter().rev().copied().collect()
    }
}

/// Pool-assigned extranonce1 values are counters laid out big-endian.
impl From<u32> for Extranonce {
    fn from(n: u32) -> Self {
        Self(n.to_be_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Extranonce {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Display for Extranonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Extranonce {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
