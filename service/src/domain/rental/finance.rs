//! Financial derivation of a [`Rental`].
//!
//! Every quantity here is a pure function of the rental's persisted fields,
//! the listing's daily price and the latest verified overdue payment; nothing
//! is stored back, so the numbers can never drift from the state they're
//! derived from.

use common::{Day, Money};

use super::{Rental, Status};
#[cfg(doc)]
use crate::domain::{payment, Listing};

/// Derived time and money quantities of a [`Rental`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Financials {
    /// Inclusive day count of the rental period.
    pub duration_days: i64,

    /// Days left until the rental period ends, counting today.
    pub remaining_days: i64,

    /// Whether the rental is past its period end without being returned.
    pub is_overdue: bool,

    /// Days elapsed past the period end.
    pub overdue_days: i64,

    /// Fee charged for the overdue days.
    pub overdue_fee: Money,

    /// Net amount the lender earns from the rental.
    pub earnings: Money,
}

impl Financials {
    /// Derives the [`Financials`] of the provided [`Rental`].
    ///
    /// `daily_rate` is the [`Listing`]'s daily price, `verified_overdue` is
    /// the amount of the latest verified overdue [`payment::Request`], if
    /// any, and `today` is the current [`Day`] in the business timezone.
    #[must_use]
    pub fn derive(
        rental: &Rental,
        daily_rate: Money,
        verified_overdue: Option<Money>,
        today: Day,
    ) -> Self {
        let overdue = is_overdue(rental, today);
        let days_over = overdue_days(rental, today);

        Self {
            duration_days: rental.period.duration_days(),
            remaining_days: remaining_days(rental, today),
            is_overdue: overdue,
            overdue_days: days_over,
            overdue_fee: overdue_fee(daily_rate, days_over, verified_overdue),
            earnings: earnings(
                rental,
                verified_overdue.unwrap_or(Money::ZERO),
            ),
        }
    }
}

/// Indicates whether the provided [`Rental`] is overdue.
///
/// A rental is overdue while it's [`Status::Active`], not returned, and
/// `today` is strictly past the last day of its period.
#[must_use]
pub fn is_overdue(rental: &Rental, today: Day) -> bool {
    rental.is_status(Status::Active)
        && rental.return_at.is_none()
        && today > rental.period.end()
}

/// Returns the number of days left in the provided [`Rental`]'s period.
///
/// Zero once the item is returned or the period is over; the full duration
/// before the period starts; the inclusive count from `today` to the period
/// end otherwise.
#[must_use]
pub fn remaining_days(rental: &Rental, today: Day) -> i64 {
    if rental.return_at.is_some() {
        return 0;
    }

    if today < rental.period.start() {
        return rental.period.duration_days();
    }
    if today > rental.period.end() {
        return 0;
    }

    today.days_until(rental.period.end()) + 1
}

/// Returns the number of days the provided [`Rental`] is past its period end.
///
/// Zero unless the rental [`is_overdue`].
#[must_use]
pub fn overdue_days(rental: &Rental, today: Day) -> i64 {
    if !is_overdue(rental, today) {
        return 0;
    }

    rental.period.end().days_until(today)
}

/// Returns the overdue fee of a [`Rental`].
///
/// A verified overdue payment is authoritative: once the renter has actually
/// been charged, the fee stays fixed even if more days elapse. Without one,
/// the fee accrues at `daily_rate` per overdue day.
#[must_use]
pub fn overdue_fee(
    daily_rate: Money,
    overdue_days: i64,
    verified_overdue: Option<Money>,
) -> Money {
    verified_overdue
        .unwrap_or_else(|| daily_rate.saturating_mul(overdue_days))
}

/// Returns the net amount the lender earns from the provided [`Rental`].
///
/// The base price less discount and service fee, floored at zero, plus the
/// *verified* overdue fee. An accruing fee the renter hasn't actually paid
/// yet is displayed via [`overdue_fee`] but never counted here.
#[must_use]
pub fn earnings(rental: &Rental, verified_overdue_fee: Money) -> Money {
    rental
        .terms
        .base_price
        .saturating_sub(rental.terms.discount)
        .saturating_sub(rental.terms.service_fee)
        .saturating_add(verified_overdue_fee)
}
