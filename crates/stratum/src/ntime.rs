use super::*;

/// Block time as submitted by miners: eight hex characters holding the four header bytes,
/// which are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, DeserializeFromStr, SerializeDisplay)]
pub struct Ntime(u32);

impl Ntime {
    pub const HEX_LEN: usize = 8;
}

impl FromStr for Ntime {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(InternalError::Parse {
                what: "ntime",
                input: s.into(),
                message: format!("expected {} hex characters", Self::HEX_LEN),
            });
        }

        let bytes = hex::decode(s).context(HexSnafu { input: s })?;

        Ok(Ntime(LittleEndian::read_u32(&bytes)))
    }
}

impl Display for Ntime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_le_bytes()))
    }
}

impl From<Ntime> for u32 {
    fn from(n: Ntime) -> u32 {
        n.0
    }
}

impl From<u32> for Ntime {
    fn from(n: u32) -> Ntime {
        Ntime(n)
    }
}
