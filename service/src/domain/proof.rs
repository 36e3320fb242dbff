//! [`Proof`] definitions.

use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{rental, user};
#[cfg(doc)]
use super::{Rental, User};
#[cfg(doc)]
use common::DateTime;

/// Uploaded image evidencing a physical step of a [`Rental`].
///
/// Existence of a [`Proof`] of a given [`Kind`] gates the transitions that
/// follow it (the return cannot be confirmed without a return [`Proof`]).
#[derive(Clone, Debug)]
pub struct Proof {
    /// ID of this [`Proof`].
    pub id: Id,

    /// ID of the [`Rental`] this [`Proof`] belongs to.
    pub rental_id: rental::Id,

    /// [`Kind`] of the evidenced step.
    pub kind: Kind,

    /// Opaque reference to the stored image.
    pub blob: BlobPath,

    /// ID of the [`User`] who submitted this [`Proof`].
    pub submitted_by: user::Id,

    /// Optional free-form [`Notes`] attached on submission.
    pub notes: Option<Notes>,

    /// [`DateTime`] when this [`Proof`] was submitted.
    pub created_at: CreationDateTime,
}

define_kind! {
    #[doc = "Kind of a [`Proof`]."]
    enum Kind {
        #[doc = "Item handed over by the lender."]
        Handover = 1,

        #[doc = "Item received by the renter."]
        Receive = 2,

        #[doc = "Item returned by the renter."]
        Return = 3,
    }
}

/// Image uploaded as a [`Proof`].
///
/// Validated on construction: only images up to [`Image::MAX_BYTES`] are
/// accepted, before anything is written to the blob storage.
#[derive(Clone, Debug)]
pub struct Image {
    /// MIME type of this [`Image`].
    content_type: String,

    /// Raw bytes of this [`Image`].
    bytes: Vec<u8>,
}

impl Image {
    /// Maximum allowed size of an [`Image`]: 5 MiB.
    pub const MAX_BYTES: usize = 5 * 1024 * 1024;

    /// Creates a new [`Image`] from the provided MIME type and bytes.
    ///
    /// # Errors
    ///
    /// If the MIME type is not an image one, or the bytes exceed
    /// [`Image::MAX_BYTES`].
    pub fn new(
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, InvalidImage> {
        let content_type = content_type.into();
        if !content_type.starts_with("image/") {
            return Err(InvalidImage::NotAnImage);
        }
        if bytes.len() > Self::MAX_BYTES {
            return Err(InvalidImage::TooLarge(bytes.len()));
        }
        Ok(Self {
            content_type,
            bytes,
        })
    }

    /// Returns the MIME type of this [`Image`].
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the raw bytes of this [`Image`].
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Error of validating an [`Image`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum InvalidImage {
    /// Provided MIME type is not an image one.
    #[display("proof must be an image")]
    NotAnImage,

    /// Provided bytes exceed [`Image::MAX_BYTES`].
    #[display("proof image of {_0} bytes exceeds the 5 MiB limit")]
    TooLarge(#[error(not(source))] usize),
}

/// Opaque reference to a stored [`Image`], as returned by the blob storage.
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, From, Into, PartialEq,
    Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct BlobPath(String);

/// Free-form notes attached to a [`Proof`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Notes(String);

impl Notes {
    /// Creates new [`Notes`] if the given text is valid.
    #[must_use]
    pub fn new(notes: impl Into<String>) -> Option<Self> {
        let notes = notes.into();
        Self::check(&notes).then_some(Self(notes))
    }

    /// Checks whether the given text is valid [`Notes`].
    fn check(notes: impl AsRef<str>) -> bool {
        let notes = notes.as_ref();
        !notes.is_empty() && notes.len() <= 500
    }
}

impl std::str::FromStr for Notes {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Notes`")
    }
}

/// ID of a [`Proof`].
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

/// [`DateTime`] of a [`Proof`] creation.
pub type CreationDateTime = DateTimeOf<(Proof, unit::Creation)>;
