//! [`Proof`]-related read definitions.
//!
//! [`Proof`]: crate::domain::Proof

use derive_more::Deref;

#[cfg(doc)]
use crate::domain::{proof, Proof, Rental};

/// Indicator whether a [`Rental`] has a [`Proof`] of some [`proof::Kind`].
#[derive(Clone, Copy, Debug, Deref, Eq, Hash, PartialEq)]
pub struct Exists(pub bool);

impl PartialEq<bool> for Exists {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}
