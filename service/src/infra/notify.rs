//! User notification definitions.
//!
//! Notifications are delivered after a command's transaction commits, so a
//! delivery failure can never roll a transition back. Commands log failed
//! deliveries and succeed anyway.

use derive_more::{Display, Error as StdError};

use crate::domain::{rental, user};
#[cfg(doc)]
use common::operations::Notify;

/// Notification delivery operation.
pub use common::Handler as Notifier;

/// Payload of a [`Notify`] operation.
#[derive(Clone, Copy, Debug)]
pub struct Notification {
    /// ID of the [`User`] to deliver the [`Event`] to.
    ///
    /// [`User`]: crate::domain::User
    pub recipient: user::Id,

    /// [`Event`] being delivered.
    pub event: Event,
}

/// Lifecycle event a [`Notification`] informs about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    /// A new rental request was created for the recipient's listing.
    RequestReceived(rental::Id),

    /// The recipient's rental request was approved.
    RequestApproved(rental::Id),

    /// The recipient's rental request was rejected.
    RequestRejected(rental::Id),

    /// A rental involving the recipient was cancelled.
    RequestCancelled(rental::Id),

    /// The recipient's rental was returned and completed.
    ReturnCompleted(rental::Id),
}

impl Event {
    /// Returns the ID of the [`Rental`] this [`Event`] concerns.
    ///
    /// [`Rental`]: crate::domain::Rental
    #[must_use]
    pub fn rental_id(self) -> rental::Id {
        match self {
            Self::RequestReceived(id)
            | Self::RequestApproved(id)
            | Self::RequestRejected(id)
            | Self::RequestCancelled(id)
            | Self::ReturnCompleted(id) => id,
        }
    }
}

/// [`Notifier`] error.
#[derive(Debug, Display, StdError)]
#[display("notification delivery failed: {message}")]
pub struct Error {
    /// Description of what went wrong.
    #[error(not(source))]
    pub message: String,
}
