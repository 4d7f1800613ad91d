use super::*;

pub type Result<T = (), E = InternalError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InternalError {
    #[snafu(display("invalid {what} `{input}`: {message}"))]
    Parse {
        what: &'static str,
        input: String,
        message: String,
    },
    #[snafu(display("invalid hex `{input}`: {source}"))]
    Hex {
        input: String,
        source: hex::FromHexError,
    },
}

/// Error codes surfaced to miners. The first few follow the numbering cgminer and friends
/// already understand; the rest extend it so that every share rejection is distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(i32)]
pub enum StratumError {
    #[display("Other/Unknown")]
    Other = 20,
    #[display("Job not found")]
    JobNotFound = 21,
    #[display("Duplicate share")]
    DuplicateShare = 22,
    #[display("Low difficulty share")]
    LowDifficultyShare = 23,
    #[display("Unauthorized worker")]
    Unauthorized = 24,
    #[display("Not subscribed")]
    NotSubscribed = 25,
    #[display("Incorrect size of extranonce2")]
    IncorrectExtraNonce2Size = 26,
    #[display("Incorrect size of nTime")]
    IncorrectNTimeSize = 27,
    #[display("nTime out of range")]
    NTimeOutOfRange = 28,
    #[display("Incorrect size of nonce")]
    IncorrectNonceSize = 29,
}

impl StratumError {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn into_response(self) -> JsonRpcError {
        JsonRpcError {
            error_code: self.code(),
            message: self.to_string(),
            traceback: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub error_code: i32,
    pub message: String,
    pub traceback: Option<Value>,
}

impl Serialize for JsonRpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.error_code, &self.message, &self.traceback).serialize(serializer)
    }
}

impl Display for JsonRpcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Stratum error {}: {}", self.error_code, self.message)
    }
}
