//! Timeline read definitions.

use crate::domain::{timeline, user};
#[cfg(doc)]
use crate::domain::{Rental, User};

/// [`timeline::Event`] resolved with its actor's display identity.
///
/// The read path returns these newest-first per [`Rental`].
#[derive(Clone, Debug)]
pub struct Entry {
    /// The recorded [`timeline::Event`].
    pub event: timeline::Event,

    /// Display [`user::Name`] of the [`User`] who performed the action.
    pub actor: user::Name,
}
