//! Service contains the rental lifecycle business logic.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;

use common::{date, Day};
use time::UtcOffset;

#[cfg(doc)]
use infra::{BlobStore, Database, Notifier};

pub use self::{command::Command, query::Query};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Timezone offset all calendar-day computations happen in.
    ///
    /// Scheduling conflicts and overdue fees are calendar-day based, so a
    /// single fixed offset is used regardless of where actors are located.
    pub business_offset: UtcOffset,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            business_offset: date::BUSINESS_OFFSET,
        }
    }
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Bs, Nt> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`BlobStore`] keeping uploaded proof images.
    blobs: Bs,

    /// [`Notifier`] delivering events to users after commits.
    notifier: Nt,
}

impl<Db, Bs, Nt> Service<Db, Bs, Nt> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(config: Config, database: Db, blobs: Bs, notifier: Nt) -> Self {
        Self {
            config,
            database,
            blobs,
            notifier,
        }
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns the [`BlobStore`] of this [`Service`].
    #[must_use]
    pub fn blobs(&self) -> &Bs {
        &self.blobs
    }

    /// Returns the [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &Nt {
        &self.notifier
    }

    /// Returns the current [`Day`] in the business timezone.
    #[must_use]
    pub fn today(&self) -> Day {
        Day::today(self.config.business_offset)
    }
}
