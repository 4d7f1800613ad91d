use super::*;

/// Diff1, the target of a difficulty 1 share: `0x00000000ffff0000..00`.
pub static DIFFICULTY_1_TARGET: LazyLock<U256> =
    LazyLock::new(|| U256::from_big_endian(&Target::MAX.to_be_bytes()));

/// Difficulty of a target, for reporting. A zero target reports as `f64::MAX`.
pub fn difficulty_from_target(target: U256) -> f64 {
    Ratio::new(*DIFFICULTY_1_TARGET, target).map_or(f64::MAX, Ratio::to_f64)
}

/// The difficulty a miner is asked to work at.
///
/// Miners see a float on the wire, but every comparison and the target derivation use the
/// exact rational value of that float, so that a share sitting exactly on a difficulty
/// boundary is judged the same way regardless of rounding.
#[derive(Debug, Clone, Copy)]
pub struct Difficulty {
    value: f64,
    exact: Ratio,
}

impl Difficulty {
    /// Returns `None` for values that are not finite and positive, or so far out of range
    /// that their target cannot be represented.
    pub fn new(value: f64) -> Option<Self> {
        if !(value.is_finite() && value > 0.0) {
            return None;
        }

        Some(Self {
            value,
            exact: Ratio::from_f64(value)?,
        })
    }

    pub fn as_f64(self) -> f64 {
        self.value
    }

    pub fn as_ratio(self) -> Ratio {
        self.exact
    }

    /// `Diff1 / difficulty`, rounded down and saturating at the 256-bit maximum.
    pub fn to_target(self) -> U256 {
        let quotient = DIFFICULTY_1_TARGET.full_mul(self.exact.denom())
            / U512::from(self.exact.numer());

        U256::try_from(quotient).unwrap_or(U256::MAX)
    }
}

impl PartialEq for Difficulty {
    fn eq(&self, other: &Self) -> bool {
        self.exact == other.exact
    }
}

impl PartialOrd for Difficulty {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.exact.cmp(&other.exact))
    }
}

impl FromStr for Difficulty {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.parse::<f64>().map_err(|err| InternalError::Parse {
            what: "difficulty",
            input: s.into(),
            message: err.to_string(),
        })?;

        Self::new(value).ok_or_else(|| InternalError::Parse {
            what: "difficulty",
            input: s.into(),
            message: "must be finite and greater than zero".into(),
        })
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(precision) => write!(f, "{:.*}", precision, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        if self.value.fract() == 0.0 && self.value <= u64::MAX as f64 {
            ser.serialize_u64(self.value as u64)
        } else {
            ser.serialize_f64(self.value)
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(de)?;
        Self::new(value).ok_or_else(|| de::Error::custom("difficulty must be finite and > 0"))
    }
}
