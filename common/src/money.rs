//! [`Money`]-related definitions.
//!
//! All monetary amounts are integer minor currency units of the single
//! marketplace currency. Keeping the arithmetic integral rules out rounding
//! drift between independently derived quantities.

use std::{fmt, iter::Sum, ops, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};

/// Non-negative amount of money in minor currency units.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[cfg_attr(
    feature = "serde",
    derive(crate::private::serde::Deserialize, crate::private::serde::Serialize),
    serde(crate = "crate::private::serde", transparent)
)]
pub struct Money(i64);

impl Money {
    /// [`Money`] amount of zero.
    pub const ZERO: Self = Self(0);

    /// Creates a new [`Money`] amount if the provided value is not negative.
    #[must_use]
    pub fn new(minor_units: i64) -> Option<Self> {
        (minor_units >= 0).then_some(Self(minor_units))
    }

    /// Returns this [`Money`] amount in minor currency units.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Adds the `other` amount to this one.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Adds the `other` amount to this one, capping at the maximum
    /// representable amount.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts the `other` amount from this one, flooring at
    /// [`Money::ZERO`].
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self((self.0 - other.0).max(0))
    }

    /// Multiplies this amount by the provided number of units, flooring a
    /// negative multiplier at [`Money::ZERO`] and capping on overflow.
    #[must_use]
    pub fn saturating_mul(self, units: i64) -> Self {
        if units <= 0 {
            return Self::ZERO;
        }
        Self(self.0.saturating_mul(units))
    }

    /// Multiplies this amount by the provided number of units (days, items,
    /// and so on).
    ///
    /// [`None`] is returned on overflow or a negative multiplier.
    #[must_use]
    pub fn checked_mul(self, units: i64) -> Option<Self> {
        if units < 0 {
            return None;
        }
        self.0.checked_mul(units).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let units = s.parse().map_err(|_| "invalid amount")?;
        Self::new(units).ok_or("negative amount")
    }
}

impl ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, ops::Add::add)
    }
}
