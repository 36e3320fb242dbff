//! Blob storage definitions.
//!
//! Proof images are persisted outside the database; only the resulting
//! [`proof::BlobPath`] is stored alongside the proof record.

use derive_more::{Display, Error as StdError};

use crate::domain::{proof, rental};
#[cfg(doc)]
use common::operations::Store;

/// Blob storage operation.
pub use common::Handler as BlobStore;

/// Payload of a [`Store`] operation uploading a proof [`Image`].
///
/// [`Image`]: proof::Image
#[derive(Clone, Debug)]
pub struct Upload {
    /// [`Bucket`] the image goes into.
    pub bucket: Bucket,

    /// ID of the [`Rental`] the image documents.
    ///
    /// [`Rental`]: crate::domain::Rental
    pub rental_id: rental::Id,

    /// Validated [`proof::Image`] to store.
    pub image: proof::Image,
}

/// Bucket of a [`BlobStore`] separating proof images by lifecycle phase.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Bucket {
    /// Images documenting the handover of an item.
    #[display("handover-proofs")]
    HandoverProofs,

    /// Images documenting the return of an item.
    #[display("return-proofs")]
    ReturnProofs,
}

/// [`BlobStore`] error.
#[derive(Debug, Display, StdError)]
#[display("blob storage error: {message}")]
pub struct Error {
    /// Description of what went wrong.
    #[error(not(source))]
    pub message: String,
}
