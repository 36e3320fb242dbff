//! Domain definitions.

pub mod listing;
pub mod payment;
pub mod proof;
pub mod reason;
pub mod rental;
pub mod schedule;
pub mod timeline;
pub mod user;

pub use self::{
    listing::Listing, proof::Proof, rental::Rental, user::User,
};
