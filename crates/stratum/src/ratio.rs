use super::*;

/// A non-negative rational number with 256-bit numerator and denominator.
///
/// Comparisons cross-multiply into 512 bits and are therefore exact. Share difficulty,
/// target and candidacy arithmetic go through this type so that floating point only
/// appears at the edges for display and for the vardiff timing loop.
#[derive(Debug, Clone, Copy)]
pub struct Ratio {
    numer: U256,
    denom: U256,
}

impl Ratio {
    /// Largest binary exponent accepted by [`Ratio::from_f64`]. A 53 bit mantissa shifted by
    /// this much still fits in 256 bits.
    const MAX_EXPONENT: i32 = 200;

    pub fn new(numer: U256, denom: U256) -> Option<Self> {
        if denom.is_zero() {
            None
        } else {
            Some(Self { numer, denom })
        }
    }

    pub fn from_integer(value: U256) -> Self {
        Self {
            numer: value,
            denom: U256::one(),
        }
    }

    /// Exact conversion of a finite, non-negative float. Values too large or too small to be
    /// represented with 256-bit parts yield `None`.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }

        if value == 0.0 {
            return Some(Self::from_integer(U256::zero()));
        }

        let bits = value.to_bits();
        let biased = ((bits >> 52) & 0x7ff) as i32;
        let fraction = bits & ((1u64 << 52) - 1);

        let (mut mantissa, mut exponent) = if biased == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1u64 << 52), biased - 1075)
        };

        let trailing = mantissa.trailing_zeros() as i32;
        mantissa >>= trailing;
        exponent += trailing;

        if exponent >= 0 {
            if exponent > Self::MAX_EXPONENT {
                return None;
            }
            Some(Self::from_integer(U256::from(mantissa) << exponent as usize))
        } else {
            let shift = exponent.unsigned_abs() as usize;
            if shift > 255 {
                return None;
            }
            Self::new(U256::from(mantissa), U256::one() << shift)
        }
    }

    pub fn numer(&self) -> U256 {
        self.numer
    }

    pub fn denom(&self) -> U256 {
        self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer.is_zero()
    }

    pub fn checked_mul_integer(self, factor: u64) -> Option<Self> {
        Some(Self {
            numer: self.numer.checked_mul(U256::from(factor))?,
            denom: self.denom,
        })
    }

    /// Nearest float, computed from a 64 bit quotient so that the result is within one ulp.
    pub fn to_f64(self) -> f64 {
        if self.numer.is_zero() {
            return 0.0;
        }

        let shift = self.denom.bits() as i32 - self.numer.bits() as i32 + 64;
        let numer = U512::from(self.numer);
        let denom = U512::from(self.denom);

        let quotient = if shift >= 0 {
            (numer << shift as usize) / denom
        } else {
            numer / (denom << shift.unsigned_abs() as usize)
        };

        quotient.low_u128() as f64 * 2f64.powi(-shift)
    }

    /// Returns true when `self >= other * numer / denom`.
    pub fn at_least_fraction_of(self, other: Ratio, numer: u64, denom: u64) -> bool {
        let lhs = self.numer.full_mul(other.denom);
        let rhs = other.numer.full_mul(self.denom);

        lhs.saturating_mul(U512::from(denom)) >= rhs.saturating_mul(U512::from(numer))
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ratio {}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numer
            .full_mul(other.denom)
            .cmp(&other.numer.full_mul(self.denom))
    }
}

impl Display for Ratio {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}
