use super::*;

/// `mining.subscribe` parameters. Only the user agent matters to the pool; session ids,
/// hosts and ports that some miners append are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subscribe {
    pub user_agent: Option<String>,
}

impl<'de> Deserialize<'de> for Subscribe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let params = Value::deserialize(deserializer)?;

        if !matches!(params, Value::Array(_) | Value::Null) {
            return Err(de::Error::custom("subscribe parameters must be an array"));
        }

        Ok(Subscribe {
            user_agent: positional_strings(&params).into_iter().next().flatten(),
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct SubscribeResult {
    pub subscriptions: Vec<(String, String)>,
    pub extranonce1: Extranonce,
    pub extranonce2_size: usize,
}

impl Serialize for SubscribeResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.subscriptions)?;
        seq.serialize_element(&self.extranonce1)?;
        seq.serialize_element(&self.extranonce2_size)?;
        seq.end()
    }
}
