//! [`Rental`]-related read definitions.

use common::{Day, Period};
use derive_more::Display;

use crate::domain::{
    listing, payment,
    rental::{self, finance, Role, Status},
    user, Listing, Rental,
};

/// Wrapper around a [`Rental`] indicating it's [`Status::Pending`].
#[derive(Clone, Debug)]
pub struct Pending<T>(pub T);

/// Selector of [`Pending`] [`Rental`]s of a [`Listing`] whose [`Period`]
/// shares at least one [`Day`] with the provided one.
///
/// Used by the approval conflict resolver to find the losers of a granted
/// [`Period`].
#[derive(Clone, Copy, Debug)]
pub struct OverlappingWith {
    /// ID of the [`Listing`] to look the [`Rental`]s up for.
    pub listing_id: listing::Id,

    /// Granted [`Period`] to check the [`Rental`]s' [`Period`]s against.
    pub period: Period,

    /// ID of the winning [`Rental`] to leave out of the result.
    pub exclude: rental::Id,
}

/// Selector of a non-terminal [`Rental`] of a [`Listing`] by the same
/// renter.
///
/// Used by the duplicate-request guard: a renter may hold at most one
/// in-flight [`Rental`] per [`Listing`].
#[derive(Clone, Copy, Debug)]
pub struct NonTerminalFor {
    /// ID of the [`Listing`] to look the [`Rental`] up for.
    pub listing_id: listing::Id,

    /// ID of the renter to look the [`Rental`] up for.
    pub renter_id: user::Id,
}

/// Set of lifecycle actions available to a concrete viewer of a [`Rental`].
///
/// This is the single derivation of per-viewer capabilities; UIs render
/// buttons from it and commands enforce the same predicates, so the two can
/// never disagree.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Actions {
    /// Viewer may approve the request.
    pub can_approve: bool,

    /// Viewer may reject the request.
    pub can_reject: bool,

    /// Viewer may cancel the rental.
    pub can_cancel: bool,

    /// Viewer may submit a payment.
    pub can_pay_now: bool,

    /// Viewer may submit the handover proof.
    pub can_handover: bool,

    /// Viewer may confirm receipt of the item.
    pub can_receive: bool,

    /// Viewer may initiate the return.
    pub can_initiate_return: bool,

    /// Viewer may schedule the return appointment.
    pub can_schedule_return: bool,

    /// Viewer may submit the return proof.
    pub can_submit_return_proof: bool,

    /// Viewer may confirm the return.
    pub can_confirm_return: bool,
}

impl Actions {
    /// Derives the [`Actions`] available to the provided viewer.
    ///
    /// `latest_payment` is the newest [`payment::Request`] of the [`Rental`],
    /// `has_verified_overdue` indicates a verified overdue payment exists,
    /// `has_return_proof` indicates a return proof was submitted, and `today`
    /// is the current [`Day`] in the business timezone.
    #[must_use]
    pub fn available(
        rental: &Rental,
        listing: &Listing,
        viewer: user::Id,
        latest_payment: Option<&payment::Request>,
        has_verified_overdue: bool,
        has_return_proof: bool,
        today: Day,
    ) -> Self {
        let role = rental.role_of(viewer, listing);
        let is_renter = role == Role::Renter;
        let is_lender = role == Role::Lender;

        let in_handover = rental.is_status(Status::ToHandover)
            || rental.is_status(Status::PendingProof);
        let overdue_unpaid =
            finance::is_overdue(rental, today) && !has_verified_overdue;

        Self {
            can_approve: is_lender && rental.can_approve(listing),
            can_reject: is_lender && rental.can_reject(),
            can_cancel: rental.can_cancel(role, latest_payment),
            can_pay_now: is_renter && rental.can_pay_now(latest_payment),
            can_handover: is_lender && in_handover,
            can_receive: is_renter && in_handover,
            can_initiate_return: is_renter
                && rental.is_status(Status::Active)
                && !overdue_unpaid,
            can_schedule_return: is_renter
                && rental.is_status(Status::PendingReturn),
            can_submit_return_proof: is_renter
                && rental.is_status(Status::ReturnScheduled),
            can_confirm_return: is_lender
                && rental.is_status(Status::ReturnProofPending)
                && has_return_proof,
        }
    }
}

/// [`Status`] of a [`Rental`] refined for display with the payment phase.
///
/// While a [`Rental`] is [`Status::Approved`], the persisted status alone
/// doesn't tell the parties what they're waiting for; the latest
/// [`payment::Request`] does.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum StatusForDisplay {
    /// Persisted lifecycle [`Status`] as is.
    #[display("{_0}")]
    Lifecycle(Status),

    /// Payment submitted, awaiting verification.
    #[display("PAYMENT_PENDING")]
    PaymentPending,

    /// Payment rejected, awaiting resubmission.
    #[display("PAYMENT_REJECTED")]
    PaymentRejected,

    /// Payment verified, awaiting handover.
    #[display("RENTER_PAID")]
    RenterPaid,
}

impl StatusForDisplay {
    /// Derives the [`StatusForDisplay`] of the provided [`Rental`].
    #[must_use]
    pub fn derive(
        rental: &Rental,
        latest_payment: Option<&payment::Request>,
    ) -> Self {
        if rental.is_status(Status::Approved) {
            if let Some(p) = latest_payment {
                return match p.status {
                    payment::Status::Pending => Self::PaymentPending,
                    payment::Status::Rejected => Self::PaymentRejected,
                    payment::Status::Verified => Self::RenterPaid,
                };
            }
        }

        Self::Lifecycle(rental.status)
    }
}
