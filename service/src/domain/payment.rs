//! Payment [`Request`] definitions.
//!
//! Payments are captured and verified by an external subsystem; this crate
//! only reads them to gate transitions (payment before handover, verified
//! overdue payment before return) and to derive earnings. Nothing here is
//! ever mutated by the lifecycle core.

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rental;
#[cfg(doc)]
use super::Rental;
#[cfg(doc)]
use common::DateTime;

/// Payment submitted by a renter for a [`Rental`].
#[derive(Clone, Debug)]
pub struct Request {
    /// ID of this payment [`Request`].
    pub id: Id,

    /// ID of the [`Rental`] this payment belongs to.
    pub rental_id: rental::Id,

    /// [`Kind`] of this payment.
    pub kind: Kind,

    /// Amount of this payment.
    pub amount: Money,

    /// External [`ReferenceNumber`] identifying the money transfer.
    pub reference_number: ReferenceNumber,

    /// Verification [`Status`] of this payment.
    pub status: Status,

    /// [`DateTime`] when this payment was verified, if it was.
    pub verified_at: Option<VerificationDateTime>,

    /// [`DateTime`] when this payment was submitted.
    pub created_at: CreationDateTime,
}

impl Request {
    /// Indicates whether this payment has been verified.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.status == Status::Verified
    }
}

define_kind! {
    #[doc = "Kind of a payment [`Request`]."]
    enum Kind {
        #[doc = "Payment of the rental itself."]
        Rental = 1,

        #[doc = "Payment of an overdue fee."]
        Overdue = 2,
    }
}

define_kind! {
    #[doc = "Verification status of a payment [`Request`]."]
    enum Status {
        #[doc = "Awaiting external verification."]
        Pending = 1,

        #[doc = "Confirmed by the external verification step."]
        Verified = 2,

        #[doc = "Rejected by the external verification step."]
        Rejected = 3,
    }
}

/// External reference number of a payment [`Request`].
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, From, Into, PartialEq,
    Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ReferenceNumber(String);

/// ID of a payment [`Request`].
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

/// [`DateTime`] of a payment [`Request`] creation.
pub type CreationDateTime = DateTimeOf<(Request, unit::Creation)>;

/// [`DateTime`] of a payment [`Request`] verification.
pub type VerificationDateTime = DateTimeOf<(Request, unit::Verification)>;
