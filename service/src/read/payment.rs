//! Payment-related read definitions.

#[cfg(doc)]
use crate::domain::{payment, Rental};

/// Wrapper around a [`payment::Request`] indicating it's the newest one of
/// its [`Rental`].
#[derive(Clone, Copy, Debug)]
pub struct Latest<T>(pub T);

/// Wrapper around a [`payment::Request`] indicating it's the newest
/// *verified* overdue payment of its [`Rental`].
///
/// Only verified overdue payments affect derived fees and earnings.
#[derive(Clone, Copy, Debug)]
pub struct VerifiedOverdue<T>(pub T);
