//! [`Listing`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user;
#[cfg(doc)]
use super::{Rental, User};

/// Item listed for rent.
///
/// Catalog management (creation, moderation, pricing rules) lives outside
/// this crate; the lifecycle core only reads a [`Listing`]'s owner, price and
/// availability flags, and flips [`Listing::is_rented`] while a [`Rental`] is
/// in progress.
#[derive(Clone, Debug)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// ID of the [`User`] owning this [`Listing`] (the lender).
    pub owner_id: user::Id,

    /// [`Title`] of this [`Listing`].
    pub title: Title,

    /// Price of renting this [`Listing`] for one day.
    ///
    /// Also the daily rate an overdue [`Rental`] is charged at.
    pub daily_price: Money,

    /// Whether this [`Listing`] is published and open for requests.
    pub is_available: bool,

    /// Whether this [`Listing`] is handed over to a renter right now.
    ///
    /// At most one non-terminated [`Rental`] may hold this flag, which is
    /// what prevents double-booking at approval time.
    pub is_rented: bool,

    /// [`DateTime`] when this [`Listing`] was created.
    pub created_at: CreationDateTime,
}

impl Listing {
    /// Indicates whether this [`Listing`] can accept a new [`Rental`]
    /// request.
    #[must_use]
    pub fn is_rentable(&self) -> bool {
        self.is_available && !self.is_rented
    }
}

/// ID of a [`Listing`].
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

/// Title of a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Title(String);

impl Title {
    /// Creates a new [`Title`] if the given `title` is valid.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Option<Self> {
        let title = title.into();
        Self::check(&title).then_some(Self(title))
    }

    /// Checks whether the given `title` is a valid [`Title`].
    fn check(title: impl AsRef<str>) -> bool {
        let title = title.as_ref();
        title.trim() == title && !title.is_empty() && title.len() <= 256
    }
}

impl std::str::FromStr for Title {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Title`")
    }
}

/// [`DateTime`] of a [`Listing`] creation.
pub type CreationDateTime = DateTimeOf<(Listing, unit::Creation)>;
