//! Token amount type for collateral and payments
//!
//! Uses rust_decimal for deterministic arithmetic. Amounts are
//! non-negative by construction; the flow tables express every
//! `max(0, a - b)` through `saturating_sub`, so nothing negative can
//! reach the ledger. Serialized as a string to prevent JSON number
//! precision loss.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// A non-negative quantity of the marketplace's payment token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(Decimal);

impl TokenAmount {
    /// Zero tokens.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Try to create an amount, returning None if negative.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from an integer token count.
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition; None on decimal overflow.
    pub fn checked_add(&self, rhs: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(rhs.0).map(TokenAmount)
    }

    /// `max(0, self - rhs)` — the difference floored at zero.
    pub fn saturating_sub(&self, rhs: TokenAmount) -> TokenAmount {
        if self.0 >= rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self::zero()
        }
    }

    /// The smaller of the two amounts.
    pub fn min(self, other: TokenAmount) -> TokenAmount {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Multiply by an instruction count.
    pub fn times(&self, count: u64) -> TokenAmount {
        Self(self.0 * Decimal::from(count))
    }
}

impl Add for TokenAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for TokenAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, x| acc + x)
    }
}

impl FromStr for TokenAmount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s)?;
        Self::try_new(decimal).ok_or(rust_decimal::Error::LessThanMinimumPossibleValue)
    }
}

// Custom serialization to preserve precision across JSON round-trips
impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal)
            .ok_or_else(|| serde::de::Error::custom("token amount must be non-negative"))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
