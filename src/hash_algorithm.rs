use super::*;

/// Proof-of-work function applied to serialized block headers.
pub trait HashAlgorithm: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Raw digest of `header`, in the byte order the function produces it.
    fn hash(&self, header: &[u8]) -> [u8; 32];

    /// Scale between this algorithm's share difficulty and the sha256 difficulty 1.
    fn multiplier(&self) -> u64 {
        1
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256d;

impl HashAlgorithm for Sha256d {
    fn name(&self) -> &'static str {
        "sha256d"
    }

    fn hash(&self, header: &[u8]) -> [u8; 32] {
        sha256d::Hash::hash(header).to_byte_array()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinbaseHasher {
    Single,
    #[default]
    Double,
}

impl CoinbaseHasher {
    pub fn hash(self, coinbase: &[u8]) -> [u8; 32] {
        match self {
            CoinbaseHasher::Single => sha256::Hash::hash(coinbase).to_byte_array(),
            CoinbaseHasher::Double => sha256d::Hash::hash(coinbase).to_byte_array(),
        }
    }
}

impl Display for CoinbaseHasher {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CoinbaseHasher::Single => write!(f, "single"),
            CoinbaseHasher::Double => write!(f, "double"),
        }
    }
}
