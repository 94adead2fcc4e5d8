//! Error types for curator-source.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading the catalog. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open catalog at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("catalog query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
