use std::{
    fmt::Display,
    ops::{Add, AddAssign, Neg, Sub},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const KES_CURRENCY_CODE: &str = "KES";

//--------------------------------------        Kes          ---------------------------------------------------------
/// An amount of Kenyan shillings, held as an integer number of cents.
///
/// Over the wire (JSON) the amount is a decimal number of shillings, e.g. `472.5`. Internally, and in the database,
/// it is always cents so that totals add up exactly.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[sqlx(transparent)]
pub struct Kes(i64);

op!(binary Kes, Add, add);
op!(binary Kes, Sub, sub);
op!(inplace Kes, AddAssign, add_assign);
op!(unary Kes, Neg, neg);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in KES: {0}")]
pub struct KesConversionError(String);

impl From<i64> for Kes {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl Kes {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_shillings(shillings: i64) -> Self {
        Self(shillings * 100)
    }

    /// Converts a decimal shilling value into cents, rounding half away from zero.
    pub fn try_from_f64(shillings: f64) -> Result<Self, KesConversionError> {
        if !shillings.is_finite() {
            return Err(KesConversionError(format!("{shillings} is not a finite number")));
        }
        let cents = (shillings * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            return Err(KesConversionError(format!("{shillings} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The amount rounded to whole shillings (half up). M-Pesa only accepts whole shilling amounts.
    pub fn whole_shillings(&self) -> i64 {
        div_round_half_up(self.0, 100)
    }

    /// `None` if the result does not fit.
    pub fn checked_mul(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Returns `pct`% of this amount, rounded half up to the nearest cent. `None` if the amount is too large.
    pub fn percent(&self, pct: i64) -> Option<Self> {
        self.0.checked_mul(pct).map(|v| Self(div_round_half_up(v, 100)))
    }
}

/// Rounds half away from zero. Cannot overflow for a positive divisor.
fn div_round_half_up(value: i64, divisor: i64) -> i64 {
    let (quotient, remainder) = (value / divisor, value % divisor);
    if remainder.unsigned_abs() * 2 >= divisor.unsigned_abs() {
        quotient + value.signum()
    } else {
        quotient
    }
}

impl Display for Kes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}KES {}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Kes {
    type Err = KesConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<f64>().map_err(|e| KesConversionError(format!("{s}: {e}")))?;
        Self::try_from_f64(value)
    }
}

impl Serialize for Kes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Kes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let shillings = f64::deserialize(deserializer)?;
        Kes::try_from_f64(shillings).map_err(serde::de::Error::custom)
    }
}
