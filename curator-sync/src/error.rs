//! Error types for curator-sync.

use std::path::PathBuf;

use thiserror::Error;

use curator_core::MappingError;
use curator_registry::RegistryError;

/// A record that cannot be fingerprinted.
#[derive(Debug, Error, PartialEq)]
pub enum FingerprintError {
    #[error("attribute {attribute} holds a non-finite number")]
    NonFinite { attribute: String },
}

/// A submission the registry would refuse; never sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("manifest is empty")]
    EmptyManifest,

    #[error("title is empty")]
    EmptyTitle,

    #[error("neither url nor doi is set")]
    MissingLocator,

    #[error("url {url:?} is not an absolute http(s) url")]
    InvalidUrl { url: String },

    #[error("update document has no id")]
    MissingId,
}

/// All errors that can arise while reconciling a record.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
