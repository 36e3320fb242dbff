//! Pickup [`Slot`] definitions.

use common::define_kind;
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use time::Time;
use uuid::Uuid;

use super::user;
#[cfg(doc)]
use super::User;

/// Recurring weekly time window a lender offers for item pickups and
/// returns.
///
/// Slot management is part of the lender's profile and lives outside this
/// crate; the lifecycle core only validates that a return is scheduled
/// against an active [`Slot`] of the right lender.
#[derive(Clone, Copy, Debug)]
pub struct Slot {
    /// ID of this [`Slot`].
    pub id: Id,

    /// ID of the [`User`] offering this [`Slot`].
    pub lender_id: user::Id,

    /// Day of the week this [`Slot`] repeats on.
    pub day_of_week: DayOfWeek,

    /// Time this [`Slot`]'s window opens at.
    pub starts_at: Time,

    /// Time this [`Slot`]'s window closes at.
    pub ends_at: Time,

    /// Whether this [`Slot`] is currently offered.
    pub is_active: bool,
}

impl Slot {
    /// Indicates whether the provided [`Day`] falls on this [`Slot`]'s
    /// weekday.
    ///
    /// [`Day`]: common::Day
    #[must_use]
    pub fn covers(&self, day: common::Day) -> bool {
        DayOfWeek::from(day.weekday()) == self.day_of_week
    }
}

define_kind! {
    #[doc = "Day of the week a [`Slot`] repeats on."]
    enum DayOfWeek {
        #[doc = "Monday."]
        Monday = 1,

        #[doc = "Tuesday."]
        Tuesday = 2,

        #[doc = "Wednesday."]
        Wednesday = 3,

        #[doc = "Thursday."]
        Thursday = 4,

        #[doc = "Friday."]
        Friday = 5,

        #[doc = "Saturday."]
        Saturday = 6,

        #[doc = "Sunday."]
        Sunday = 7,
    }
}

impl From<time::Weekday> for DayOfWeek {
    fn from(weekday: time::Weekday) -> Self {
        use time::Weekday as W;

        match weekday {
            W::Monday => Self::Monday,
            W::Tuesday => Self::Tuesday,
            W::Wednesday => Self::Wednesday,
            W::Thursday => Self::Thursday,
            W::Friday => Self::Friday,
            W::Saturday => Self::Saturday,
            W::Sunday => Self::Sunday,
        }
    }
}

/// ID of a [`Slot`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
