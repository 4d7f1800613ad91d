use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Software {
    #[display("bfgminer")]
    Bfgminer,
    #[display("ccminer")]
    Ccminer,
    #[display("cgminer")]
    Cgminer,
    #[display("cudaminer")]
    Cudaminer,
    #[default]
    #[display("unknown")]
    Unknown,
}

/// Mining software as announced in the subscribe user agent, `name/version`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MinerSoftware {
    pub software: Software,
    pub version: Option<String>,
}

impl MinerSoftware {
    pub fn parse(user_agent: &str) -> Self {
        let mut parts = user_agent.trim().splitn(2, '/');

        let software = match parts
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "bfgminer" => Software::Bfgminer,
            "ccminer" => Software::Ccminer,
            "cgminer" => Software::Cgminer,
            "cudaminer" => Software::Cudaminer,
            _ => Software::Unknown,
        };

        let version = parts
            .next()
            .map(str::trim)
            .filter(|version| !version.is_empty())
            .map(str::to_owned);

        Self { software, version }
    }
}

impl Display for MinerSoftware {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}/{version}", self.software),
            None => write!(f, "{}", self.software),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn case(user_agent: &str, software: Software, version: Option<&str>) {
        assert_eq!(
            MinerSoftware::parse(user_agent),
            MinerSoftware {
                software,
                version: version.map(str::to_owned),
            }
        );
    }

    #[test]
    fn known_miners() {
        case("cgminer/4.10.0", Software::Cgminer, Some("4.10.0"));
        case("bfgminer/5.5.0", Software::Bfgminer, Some("5.5.0"));
        case("ccminer/2.3.1", Software::Ccminer, Some("2.3.1"));
        case("cudaMiner/2014-02-28", Software::Cudaminer, Some("2014-02-28"));
        case("CGMiner", Software::Cgminer, None);
    }

    #[test]
    fn unknown_miners_keep_version() {
        case("NiceHash/1.0.0", Software::Unknown, Some("1.0.0"));
        case("", Software::Unknown, None);
        case("cgminer/", Software::Cgminer, None);
    }

    #[test]
    fn display() {
        assert_eq!(MinerSoftware::parse("cgminer/4.10.0").to_string(), "cgminer/4.10.0");
        assert_eq!(MinerSoftware::default().to_string(), "unknown");
    }
}
