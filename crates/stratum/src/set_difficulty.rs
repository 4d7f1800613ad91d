use super::*;

/// `mining.set_difficulty` parameters: a single number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetDifficulty(pub Difficulty);

impl Serialize for SetDifficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.0].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SetDifficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (difficulty,) = <(Difficulty,)>::deserialize(deserializer)?;
        Ok(SetDifficulty(difficulty))
    }
}
