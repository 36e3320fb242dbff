//! Infrastructure layer.

pub mod blob;
pub mod database;
pub mod notify;

pub use self::{blob::BlobStore, database::Database, notify::Notifier};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
