//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing a physical item handover.
#[derive(Clone, Copy, Debug)]
pub struct Handover;

/// Marker type describing a physical item return.
#[derive(Clone, Copy, Debug)]
pub struct Return;

/// Marker type describing an external verification.
#[derive(Clone, Copy, Debug)]
pub struct Verification;
