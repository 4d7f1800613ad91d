use super::*;

/// `client.show_message` parameters: informational text for the miner operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowMessage(pub String);

impl Serialize for ShowMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [&self.0].serialize(serializer)
    }
}
