//! Error types for curator-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ExternalId, RecordId};

/// Errors raised by a [`MappingStore`](crate::mapping::MappingStore).
#[derive(Debug, Error)]
pub enum MappingError {
    /// The rid already has an external id; mappings are never overwritten.
    #[error("duplicate mapping: {rid} is already mapped to {existing}")]
    DuplicateMapping { rid: RecordId, existing: ExternalId },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Mapping file exists but could not be parsed.
    #[error("failed to parse mapping store at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Backend-specific failure (database driver, lock poisoning).
    #[error("mapping backend error: {0}")]
    Backend(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// A required setting is empty.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or pass --config")]
    HomeNotFound,
}

pub(crate) fn mapping_io(path: impl Into<PathBuf>, source: std::io::Error) -> MappingError {
    MappingError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
