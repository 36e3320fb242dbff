//! Calendar-day arithmetic.
//!
//! All scheduling and overdue computations are calendar-day based, so
//! timestamps are always collapsed to a [`Day`] in a single fixed timezone
//! before any comparison.

use std::{fmt, str::FromStr};

use derive_more::{Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use time::{
    format_description::BorrowedFormatItem, macros::format_description, Date,
    Duration, OffsetDateTime, UtcOffset,
};

use crate::DateTimeOf;

/// Timezone the marketplace operates in (UTC+8).
pub const BUSINESS_OFFSET: UtcOffset = match UtcOffset::from_hms(8, 0, 0) {
    Ok(offset) => offset,
    Err(_) => panic!("invalid UTC offset"),
};

/// `[year]-[month]-[day]` format of a [`Day`].
const FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]");

/// Calendar day in the marketplace timezone.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Day(Date);

impl Day {
    /// Returns the current [`Day`] in the provided timezone.
    #[must_use]
    pub fn today(offset: UtcOffset) -> Self {
        Self(OffsetDateTime::now_utc().to_offset(offset).date())
    }

    /// Collapses the provided [`DateTimeOf`] to the [`Day`] it falls on in
    /// the provided timezone.
    #[must_use]
    pub fn of<Of: ?Sized>(dt: DateTimeOf<Of>, offset: UtcOffset) -> Self {
        Self(OffsetDateTime::from(dt).to_offset(offset).date())
    }

    /// Returns the number of whole days from this [`Day`] until the `other`
    /// one.
    ///
    /// Negative if the `other` [`Day`] is earlier than this one.
    #[must_use]
    pub fn days_until(self, other: Self) -> i64 {
        (other.0 - self.0).whole_days()
    }

    /// Returns the [`Day`] `days` after this one.
    ///
    /// [`None`] is returned on calendar overflow.
    #[must_use]
    pub fn plus_days(self, days: i64) -> Option<Self> {
        self.0.checked_add(Duration::days(days)).map(Self)
    }

    /// Returns the [`Weekday`] this [`Day`] falls on.
    ///
    /// [`Weekday`]: time::Weekday
    #[must_use]
    pub fn weekday(self) -> time::Weekday {
        self.0.weekday()
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.format(FORMAT).map_err(|_| fmt::Error)?)
    }
}

impl From<Date> for Day {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl From<Day> for Date {
    fn from(day: Day) -> Self {
        day.0
    }
}

impl FromStr for Day {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Date::parse(s, FORMAT).map(Self).map_err(ParseError)
    }
}

/// Error of parsing a [`Day`] from a string.
#[derive(Clone, Debug, Display, Error)]
#[display("invalid `[year]-[month]-[day]` day: {_0}")]
pub struct ParseError(time::error::Parse);

/// Inclusive range of [`Day`]s.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Period {
    /// First [`Day`] of this [`Period`].
    start: Day,

    /// Last [`Day`] of this [`Period`], inclusive.
    end: Day,
}

impl Period {
    /// Creates a new [`Period`] if `start` doesn't come after `end`.
    #[must_use]
    pub fn new(start: Day, end: Day) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Returns the first [`Day`] of this [`Period`].
    #[must_use]
    pub fn start(&self) -> Day {
        self.start
    }

    /// Returns the last [`Day`] of this [`Period`], inclusive.
    #[must_use]
    pub fn end(&self) -> Day {
        self.end
    }

    /// Returns the number of [`Day`]s this [`Period`] spans, counting both
    /// its bounds.
    #[must_use]
    pub fn duration_days(&self) -> i64 {
        self.start.days_until(self.end) + 1
    }

    /// Indicates whether this [`Period`] shares at least one [`Day`] with the
    /// `other` one.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Indicates whether the provided [`Day`] falls into this [`Period`].
    #[must_use]
    pub fn contains(&self, day: Day) -> bool {
        self.start <= day && day <= self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { start, end } = self;
        write!(f, "{start} to {end}")
    }
}
