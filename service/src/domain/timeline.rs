//! Timeline [`Event`] definitions.

use common::{define_kind, unit, DateTime, DateTimeOf};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{rental, user, Rental};
#[cfg(doc)]
use super::User;

/// Audit record of a state-changing action upon a [`Rental`].
///
/// Append-only: an [`Event`] is inserted in the same transaction as the
/// transition it describes and is never updated or deleted afterwards.
#[derive(Clone, Debug)]
pub struct Event {
    /// ID of this [`Event`].
    pub id: Id,

    /// ID of the [`Rental`] this [`Event`] belongs to.
    pub rental_id: rental::Id,

    /// ID of the [`User`] who performed the action.
    pub actor_id: user::Id,

    /// [`Kind`] of the action performed.
    pub kind: Kind,

    /// [`rental::Status`] the [`Rental`] had right after the action.
    ///
    /// Captured at the moment of the event, not re-derived later, so history
    /// stays correct even if status derivation logic changes.
    pub status: rental::Status,

    /// Free-form details of the action.
    pub metadata: Option<Metadata>,

    /// [`DateTime`] when this [`Event`] happened.
    pub created_at: CreationDateTime,
}

impl Event {
    /// Records a new [`Event`] of the provided [`Rental`].
    ///
    /// The [`Rental`] must already carry the post-transition
    /// [`rental::Status`].
    #[must_use]
    pub fn record(
        rental: &Rental,
        kind: Kind,
        actor_id: user::Id,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            id: Id::new(),
            rental_id: rental.id,
            actor_id,
            kind,
            status: rental.status,
            metadata,
            created_at: DateTime::now().coerce(),
        }
    }
}

define_kind! {
    #[doc = "Kind of a timeline [`Event`]."]
    enum Kind {
        #[doc = "Rental requested by a renter."]
        Requested = 1,

        #[doc = "Request approved by the lender."]
        Approved = 2,

        #[doc = "Request rejected by the lender."]
        Rejected = 3,

        #[doc = "Rental cancelled."]
        Cancelled = 4,

        #[doc = "Rental payment confirmed as verified."]
        PaymentConfirmed = 5,

        #[doc = "Handover proof submitted by the lender."]
        Handover = 6,

        #[doc = "Receipt proof submitted by the renter."]
        Receive = 7,

        #[doc = "Return process initiated by the renter."]
        ReturnInitiated = 8,

        #[doc = "Return appointment agreed upon."]
        ReturnScheduled = 9,

        #[doc = "Return proof submitted."]
        ReturnProofSubmitted = 10,

        #[doc = "Return confirmed by the lender."]
        ReturnCompleted = 11,
    }
}

/// Free-form details of an [`Event`], kept as JSON.
#[derive(Clone, Debug, Deserialize, From, Into, PartialEq, Serialize)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Metadata(serde_json::Value);

/// ID of an [`Event`].
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

/// [`DateTime`] of an [`Event`] creation.
pub type CreationDateTime = DateTimeOf<(Event, unit::Creation)>;
