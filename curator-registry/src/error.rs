//! Error types for curator-registry.

use thiserror::Error;

/// Every way a registry call can fail. None of these are retried.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Non-success HTTP status.
    #[error("registry returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// HTTP success carrying an error document.
    #[error("registry rejected the request: {0}")]
    Rejected(String),

    #[error("registry authentication failed; check the token")]
    AuthenticationFailed,

    /// Connection failure or timeout.
    #[error("registry unreachable: {0}")]
    Transport(String),

    /// Response body did not have the expected shape.
    #[error("malformed registry response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Malformed(err.to_string())
    }
}
