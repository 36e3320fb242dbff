//! Read entities definitions.

pub mod payment;
pub mod proof;
pub mod rental;
pub mod timeline;
