use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorize {
    pub username: String,
    pub password: Option<String>,
}

impl<'de> Deserialize<'de> for Authorize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let params = Value::deserialize(deserializer)?;
        let mut strings = positional_strings(&params).into_iter();

        let username = strings
            .next()
            .flatten()
            .ok_or_else(|| de::Error::custom("authorize requires a username"))?;

        Ok(Authorize {
            username,
            password: strings.next().flatten(),
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn username_and_password() {
        assert_eq!(
            serde_json::from_value::<Authorize>(json!(["alice.rig1", "x"])).unwrap(),
            Authorize {
                username: "alice.rig1".into(),
                password: Some("x".into()),
            }
        );
    }

    #[test]
    fn password_is_optional() {
        assert_eq!(
            serde_json::from_value::<Authorize>(json!(["alice"])).unwrap(),
            Authorize {
                username: "alice".into(),
                password: None,
            }
        );
        assert_eq!(
            serde_json::from_value::<Authorize>(json!(["alice", null]))
                .unwrap()
                .password,
            None
        );
    }

    #[test]
    fn username_is_required() {
        assert!(serde_json::from_value::<Authorize>(json!([])).is_err());
        assert!(serde_json::from_value::<Authorize>(json!([42])).is_err());
    }
}
