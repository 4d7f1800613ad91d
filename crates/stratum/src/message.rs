use super::*;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Display, Clone)]
#[serde(untagged)]
pub enum Id {
    #[display("null")]
    Null,
    Number(u64),
    String(String),
}

#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum Message {
    Request {
        id: Id,
        method: String,
        params: Value,
    },
    Response {
        id: Id,
        result: Option<Value>,
        error: Option<JsonRpcError>,
    },
    Notification {
        method: String,
        params: Value,
    },
}

impl Message {
    pub fn notification(method: &str, params: impl Serialize) -> Self {
        Message::Notification {
            method: method.into(),
            params: serde_json::to_value(params).unwrap_or(Value::Null),
        }
    }

    pub fn result(id: Id, result: impl Serialize) -> Self {
        Message::Response {
            id,
            result: Some(serde_json::to_value(result).unwrap_or(Value::Null)),
            error: None,
        }
    }

    pub fn error(id: Id, error: JsonRpcError) -> Self {
        Message::Response {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Stratum notifications often carry `"id": null`, which JSON-RPC says should be absent. A
/// method with a null or missing id is a notification, a method with an id is a request, and
/// anything else with an id is a response.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            id: Option<Id>,
            method: Option<String>,
            params: Option<Value>,
            result: Option<Value>,
            error: Option<Value>,
        }

        let raw = Raw::deserialize(deserializer)?;

        match (raw.method, raw.id) {
            (Some(method), Some(id)) if id != Id::Null => Ok(Message::Request {
                id,
                method,
                params: raw.params.unwrap_or(Value::Array(Vec::new())),
            }),
            (Some(method), _) => Ok(Message::Notification {
                method,
                params: raw.params.unwrap_or(Value::Array(Vec::new())),
            }),
            (None, Some(id)) => {
                let error = match raw.error {
                    None | Some(Value::Null) => None,
                    Some(Value::Array(items)) => {
                        let (error_code, message, traceback) =
                            serde_json::from_value::<(i32, String, Option<Value>)>(
                                Value::Array(items),
                            )
                            .map_err(de::Error::custom)?;
                        Some(JsonRpcError {
                            error_code,
                            message,
                            traceback,
                        })
                    }
                    Some(other) => {
                        Some(serde_json::from_value(other).map_err(de::Error::custom)?)
                    }
                };

                Ok(Message::Response {
                    id,
                    result: raw.result,
                    error,
                })
            }
            (None, None) => Err(de::Error::custom("unknown message format")),
        }
    }
}
