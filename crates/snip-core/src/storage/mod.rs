//! Snippet record store
//!
//! SQLite-backed persistence treated by the rest of the crate as an
//! atomic-increment-capable key-value record store.

mod error;
mod records;
mod schema;

pub use error::{StorageError, StorageResult};
pub use records::SnippetRecords;
pub use schema::SCHEMA_VERSION;
