use super::*;

/// `mining.set_target` parameters: the share target as 64 big-endian hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTarget(pub U256);

impl Serialize for SetTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [hex::encode(self.0.to_big_endian())].serialize(serializer)
    }
}
