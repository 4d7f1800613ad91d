use super::*;

/// `mining.submit` parameters: worker, job id, nTime, extranonce2 and, for coins whose
/// header carries a proof-of-work solution, the solution. Values stay as sent so the share
/// pipeline can classify malformed fields instead of dropping the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub username: String,
    pub job_id: String,
    pub ntime: String,
    pub extranonce2: String,
    pub solution: String,
}

impl Serialize for Submit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.solution.is_empty() { 4 } else { 5 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.username)?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.extranonce2)?;
        if !self.solution.is_empty() {
            seq.serialize_element(&self.solution)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Submit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let params = Vec::<String>::deserialize(deserializer)?;

        let (username, job_id, ntime, extranonce2, solution) = match params.as_slice() {
            [username, job_id, ntime, extranonce2] => {
                (username, job_id, ntime, extranonce2, String::new())
            }
            [username, job_id, ntime, extranonce2, solution] => {
                (username, job_id, ntime, extranonce2, solution.clone())
            }
            _ => {
                return Err(de::Error::invalid_length(
                    params.len(),
                    &"4 or 5 submit parameters",
                ));
            }
        };

        Ok(Submit {
            username: username.clone(),
            job_id: job_id.clone(),
            ntime: ntime.clone(),
            extranonce2: extranonce2.clone(),
            solution,
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn with_solution() {
        let submit = serde_json::from_value::<Submit>(json!([
            "t1worker.rig",
            "1a",
            "b8864e50",
            "0000000000000000000000000000000000000000000000000000002a",
            "fd4005"
        ]))
        .unwrap();

        assert_eq!(submit.username, "t1worker.rig");
        assert_eq!(submit.job_id, "1a");
        assert_eq!(submit.ntime, "b8864e50");
        assert_eq!(submit.extranonce2.len(), 56);
        assert_eq!(submit.solution, "fd4005");

        let round_trip =
            serde_json::from_value::<Submit>(serde_json::to_value(&submit).unwrap()).unwrap();
        assert_eq!(round_trip, submit);
    }

    #[test]
    fn without_solution() {
        let submit =
            serde_json::from_value::<Submit>(json!(["worker", "2", "b8864e50", "00000001"]))
                .unwrap();

        assert!(submit.solution.is_empty());
        assert_eq!(
            serde_json::to_value(&submit).unwrap(),
            json!(["worker", "2", "b8864e50", "00000001"])
        );
    }

    #[test]
    fn wrong_arity_or_types_are_rejected() {
        assert!(serde_json::from_value::<Submit>(json!(["worker", "2", "b8864e50"])).is_err());
        assert!(serde_json::from_value::<Submit>(json!(["w", "2", "t", "e", "s", "x"])).is_err());
        assert!(serde_json::from_value::<Submit>(json!(["worker", 2, "b8864e50", "00"])).is_err());
        assert!(serde_json::from_value::<Submit>(json!({"worker": "w"})).is_err());
    }
}
