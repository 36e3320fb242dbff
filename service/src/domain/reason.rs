//! Rejection and cancellation reason definitions.
//!
//! Reasons are read-only catalogs maintained outside this crate; rejecting
//! or cancelling a [`Rental`] attaches a [`rejection::Record`] or a
//! [`cancellation::Record`] referencing a catalog entry and carrying an
//! optional free-form feedback note.
//!
//! [`Rental`]: super::Rental

use std::str::FromStr;

use common::define_kind;
use derive_more::AsRef;
use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};

define_kind! {
    #[doc = "Role a cancellation reason applies to."]
    enum Role {
        #[doc = "Reason offered to renters only."]
        Renter = 1,

        #[doc = "Reason offered to lenders only."]
        Lender = 2,

        #[doc = "Reason offered to both sides."]
        Both = 3,
    }
}

/// Human-readable label of a catalog reason.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Label(pub String);

/// Free-form feedback note attached to a reason [`Record`].
///
/// Required when the chosen reason is the free-form `Other` one.
///
/// [`Record`]: rejection::Record
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Feedback(String);

impl Feedback {
    /// Creates a new [`Feedback`] if the given text is valid.
    #[must_use]
    pub fn new(feedback: impl Into<String>) -> Option<Self> {
        let feedback = feedback.into();
        Self::check(&feedback).then_some(Self(feedback))
    }

    /// Checks whether the given text is a valid [`Feedback`].
    fn check(feedback: impl AsRef<str>) -> bool {
        let feedback = feedback.as_ref();
        !feedback.is_empty() && feedback.len() <= 1000
    }
}

impl FromStr for Feedback {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Feedback`")
    }
}

pub mod rejection {
    //! Rejection reason definitions.

    use common::{define_kind, unit, DateTimeOf};
    use derive_more::{Display, From, FromStr, Into};
    #[cfg(feature = "postgres")]
    use postgres_types::{FromSql, ToSql};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use crate::domain::{rental, user};
    #[cfg(doc)]
    use crate::domain::{Rental, User};
    #[cfg(doc)]
    use common::DateTime;

    use super::Label;

    define_kind! {
        #[doc = "Machine-readable code of a rejection [`Reason`]."]
        enum Code {
            #[doc = "Item is unavailable for the requested period."]
            Unavailable = 1,

            #[doc = "Lender doubts the renter."]
            RenterUnsuitable = 2,

            #[doc = "Free-form reason, requires a feedback note."]
            Other = 3,
        }
    }

    /// Catalog entry a [`Rental`] rejection can reference.
    #[derive(Clone, Debug)]
    pub struct Reason {
        /// ID of this [`Reason`].
        pub id: Id,

        /// Machine-readable [`Code`] of this [`Reason`].
        pub code: Code,

        /// Human-readable [`Label`] of this [`Reason`].
        pub label: Label,
    }

    /// Attachment of a rejection [`Reason`] to a [`Rental`].
    ///
    /// Created once when the rental transitions to rejected; historical
    /// records are retained, the newest one is shown.
    #[derive(Clone, Debug)]
    pub struct Record {
        /// ID of the rejected [`Rental`].
        pub rental_id: rental::Id,

        /// ID of the referenced [`Reason`].
        pub reason_id: Id,

        /// Optional free-form note of the rejecting lender.
        pub feedback: Option<super::Feedback>,

        /// ID of the [`User`] who attributed the rejection.
        pub attributed_by: user::Id,

        /// [`DateTime`] when this [`Record`] was created.
        pub created_at: CreationDateTime,
    }

    /// ID of a rejection [`Reason`].
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
    #[cfg_attr(
        feature = "postgres",
        derive(ToSql, FromSql),
        postgres(transparent)
    )]
    pub struct Id(Uuid);

    impl Id {
        /// Creates a new random [`Id`].
        #[must_use]
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    /// [`DateTime`] of a [`Record`] creation.
    pub type CreationDateTime = DateTimeOf<(Record, unit::Creation)>;
}

pub mod cancellation {
    //! Cancellation reason definitions.

    use common::{define_kind, unit, DateTimeOf};
    use derive_more::{Display, From, FromStr, Into};
    #[cfg(feature = "postgres")]
    use postgres_types::{FromSql, ToSql};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use crate::domain::{rental, user};
    #[cfg(doc)]
    use crate::domain::{Rental, User};
    #[cfg(doc)]
    use common::DateTime;

    use super::{Label, Role};

    define_kind! {
        #[doc = "Machine-readable code of a cancellation [`Reason`]."]
        enum Code {
            #[doc = "Plans changed."]
            ChangeOfPlans = 1,

            #[doc = "Item no longer needed or no longer offered."]
            NoLongerNeeded = 2,

            #[doc = "Free-form reason, requires a feedback note."]
            Other = 3,
        }
    }

    /// Catalog entry a [`Rental`] cancellation can reference.
    #[derive(Clone, Debug)]
    pub struct Reason {
        /// ID of this [`Reason`].
        pub id: Id,

        /// Machine-readable [`Code`] of this [`Reason`].
        pub code: Code,

        /// Human-readable [`Label`] of this [`Reason`].
        pub label: Label,

        /// [`Role`] this [`Reason`] is offered to.
        pub role: Role,
    }

    impl Reason {
        /// Indicates whether this [`Reason`] is offered to the provided
        /// rental [`rental::Role`].
        #[must_use]
        pub fn applies_to(&self, role: rental::Role) -> bool {
            match self.role {
                Role::Both => true,
                Role::Renter => role == rental::Role::Renter,
                Role::Lender => role == rental::Role::Lender,
            }
        }
    }

    /// Attachment of a cancellation [`Reason`] to a [`Rental`].
    #[derive(Clone, Debug)]
    pub struct Record {
        /// ID of the cancelled [`Rental`].
        pub rental_id: rental::Id,

        /// ID of the referenced [`Reason`].
        pub reason_id: Id,

        /// Optional free-form note of the cancelling actor.
        pub feedback: Option<super::Feedback>,

        /// ID of the [`User`] who cancelled the rental.
        pub attributed_by: user::Id,

        /// [`DateTime`] when this [`Record`] was created.
        pub created_at: CreationDateTime,
    }

    /// ID of a cancellation [`Reason`].
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
    #[cfg_attr(
        feature = "postgres",
        derive(ToSql, FromSql),
        postgres(transparent)
    )]
    pub struct Id(Uuid);

    impl Id {
        /// Creates a new random [`Id`].
        #[must_use]
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    /// [`DateTime`] of a [`Record`] creation.
    pub type CreationDateTime = DateTimeOf<(Record, unit::Creation)>;
}
