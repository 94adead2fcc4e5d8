//! Curator core library — domain types, row collapsing, mapping store, config.
//!
//! - [`types`] — newtypes, records, manifests, outcomes
//! - [`rows`] — collapse catalog rows into records
//! - [`mapping`] — [`MappingStore`] trait plus in-memory and YAML-backed stores
//! - [`config`] — `config.yaml` loading
//! - [`error`] — [`MappingError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod mapping;
pub mod rows;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, MappingError};
pub use mapping::{FileMappingStore, InMemoryMappingStore, MappingStore};
pub use types::{
    AttributeValue, DigestAlgorithm, ExternalId, FileEntry, Fingerprint, FundingEntry, Manifest,
    ManifestDiff, ReconciliationOutcome, Record, RecordId, RecordRow,
};
