//! # curator-source
//!
//! Read-only access to the catalog database and the SQLite-backed mapping
//! store that lives beside it.
//!
//! Call [`load_records`] to turn a [`SourceProvider`]'s rows into one
//! [`Record`](curator_core::Record) per rid with funding attached.

pub mod error;
pub mod mapping;
pub mod provider;
pub mod schema;

pub use error::SourceError;
pub use mapping::SqliteMappingStore;
pub use provider::{load_records, SourceProvider, SqliteSource};
