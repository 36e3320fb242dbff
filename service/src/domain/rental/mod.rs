//! [`Rental`] definitions.

pub mod finance;

use common::{define_kind, unit, DateTimeOf, Day, Money, Period};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{listing, payment, schedule, user, Listing};
#[cfg(doc)]
use super::{proof::Proof, timeline, User};
#[cfg(doc)]
use common::DateTime;

/// Request of a [`User`] to rent a [`Listing`] for a [`Period`], progressing
/// through the rental lifecycle.
///
/// The [`Status`] field is the single source of truth of where in the
/// lifecycle the rental is; it's mutated by commands only, inside a
/// transaction together with the related records ([`Proof`]s,
/// [`timeline::Event`]s, reason records) of the transition.
#[derive(Clone, Debug)]
pub struct Rental {
    /// ID of this [`Rental`].
    pub id: Id,

    /// ID of the [`Listing`] being rented.
    ///
    /// The [`Listing`]'s owner is the lender of this [`Rental`]; lender
    /// identity is always resolved through the [`Listing`], never stored
    /// here.
    pub listing_id: listing::Id,

    /// ID of the [`User`] requesting the rent.
    pub renter_id: user::Id,

    /// Calendar-day [`Period`] the [`Listing`] is rented for, inclusive on
    /// both ends.
    pub period: Period,

    /// Priced [`Terms`] this [`Rental`] was requested under.
    pub terms: Terms,

    /// Current [`Status`] of this [`Rental`].
    pub status: Status,

    /// Return appointment agreed upon, if any.
    pub return_appointment: Option<ReturnAppointment>,

    /// [`DateTime`] when the [`Listing`] was confirmed received by the
    /// renter.
    ///
    /// Set exactly once by the receive transition.
    pub handover_at: Option<HandoverDateTime>,

    /// [`DateTime`] when the return was confirmed by the lender.
    ///
    /// Set exactly once by the return confirmation transition.
    pub return_at: Option<ReturnDateTime>,

    /// [`DateTime`] when this [`Rental`] was created.
    pub created_at: CreationDateTime,
}

impl Rental {
    /// Indicates whether this [`Rental`] has the provided [`Status`].
    #[must_use]
    pub fn is_status(&self, status: Status) -> bool {
        self.status == status
    }

    /// Returns the [`Role`] the provided viewer plays in this [`Rental`].
    ///
    /// Roles are derived structurally from the renter reference and the
    /// [`Listing`] ownership, never stored.
    #[must_use]
    pub fn role_of(&self, viewer: user::Id, listing: &Listing) -> Role {
        if viewer == self.renter_id {
            Role::Renter
        } else if viewer == listing.owner_id {
            Role::Lender
        } else {
            Role::Neither
        }
    }

    /// Indicates whether this [`Rental`] can be approved against the provided
    /// [`Listing`].
    #[must_use]
    pub fn can_approve(&self, listing: &Listing) -> bool {
        self.is_status(Status::Pending) && !listing.is_rented
    }

    /// Indicates whether this [`Rental`] can be rejected.
    #[must_use]
    pub fn can_reject(&self) -> bool {
        self.is_status(Status::Pending)
    }

    /// Indicates whether an actor with the provided [`Role`] can cancel this
    /// [`Rental`], considering the latest [`payment::Request`] on it.
    ///
    /// The renter may cancel while the rental is pending, or while it's
    /// approved and no payment has been made (or the payment was rejected).
    /// The lender may cancel only while it's approved, under the same payment
    /// condition.
    #[must_use]
    pub fn can_cancel(
        &self,
        role: Role,
        latest_payment: Option<&payment::Request>,
    ) -> bool {
        let no_settled_payment = latest_payment
            .is_none_or(|p| p.status == payment::Status::Rejected);

        match role {
            Role::Renter => match self.status {
                Status::Pending => true,
                Status::Approved => no_settled_payment,
                Status::ToHandover
                | Status::PendingProof
                | Status::Active
                | Status::PendingReturn
                | Status::ReturnScheduled
                | Status::ReturnProofPending
                | Status::Completed
                | Status::Rejected
                | Status::Cancelled => false,
            },
            Role::Lender => {
                self.is_status(Status::Approved) && no_settled_payment
            }
            Role::Neither => false,
        }
    }

    /// Indicates whether the renter can submit a payment for this [`Rental`]
    /// right now.
    #[must_use]
    pub fn can_pay_now(
        &self,
        latest_payment: Option<&payment::Request>,
    ) -> bool {
        self.is_status(Status::Approved)
            && latest_payment
                .is_none_or(|p| p.status == payment::Status::Rejected)
    }
}

define_kind! {
    #[doc = "Status of a [`Rental`] in its lifecycle."]
    enum Status {
        #[doc = "Requested by a renter, awaiting the lender's decision."]
        Pending = 1,

        #[doc = "Approved by the lender, awaiting payment."]
        Approved = 2,

        #[doc = "Paid, awaiting the lender to hand the item over."]
        ToHandover = 3,

        #[doc = "Handover proof uploaded, awaiting the renter's receipt."]
        PendingProof = 4,

        #[doc = "In the renter's hands."]
        Active = 5,

        #[doc = "Return initiated by the renter."]
        PendingReturn = 6,

        #[doc = "Return appointment agreed upon."]
        ReturnScheduled = 7,

        #[doc = "Return proof uploaded, awaiting the lender's confirmation."]
        ReturnProofPending = 8,

        #[doc = "Returned and confirmed, the lifecycle is over."]
        Completed = 9,

        #[doc = "Rejected by the lender."]
        Rejected = 10,

        #[doc = "Cancelled by the renter or the lender."]
        Cancelled = 11,
    }
}

impl Status {
    /// Indicates whether this [`Status`] is terminal.
    ///
    /// A [`Rental`] in a terminal [`Status`] never transitions again, and
    /// doesn't count as an existing request when the same renter requests the
    /// same [`Listing`] anew.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }
}

/// Role a viewer plays in a [`Rental`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Viewer is the [`User`] renting the [`Listing`].
    Renter,

    /// Viewer is the [`User`] owning the [`Listing`].
    Lender,

    /// Viewer is unrelated to the [`Rental`].
    Neither,
}

/// Priced terms of a [`Rental`].
///
/// All amounts are integer minor currency units and non-negative by
/// construction of [`Money`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Terms {
    /// Price of the whole rental [`Period`] before adjustments.
    pub base_price: Money,

    /// Discount subtracted from the base price.
    pub discount: Money,

    /// Fee retained by the marketplace.
    pub service_fee: Money,

    /// Refundable deposit collected from the renter.
    pub deposit_fee: Money,

    /// Total amount the renter is charged.
    pub total_price: Money,
}

/// Agreed-upon return appointment of a [`Rental`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReturnAppointment {
    /// ID of the lender's [`schedule::Slot`] the return happens in.
    pub slot_id: schedule::Id,

    /// [`Day`] the return happens on.
    pub date: Day,
}

/// ID of a [`Rental`].
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

/// [`DateTime`] of a [`Rental`] creation.
pub type CreationDateTime = DateTimeOf<(Rental, unit::Creation)>;

/// [`DateTime`] of a [`Rental`] handover to the renter.
pub type HandoverDateTime = DateTimeOf<(Rental, unit::Handover)>;

/// [`DateTime`] of a [`Rental`] return to the lender.
pub type ReturnDateTime = DateTimeOf<(Rental, unit::Return)>;
