//! Common error types for perspective management

use thiserror::Error;

/// Common result type for perspective operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the codec and lifecycle
#[derive(Error, Debug)]
pub enum Error {
    /// User-authored model violates a structural invariant before encode
    #[error("Malformed config at {path}: {reason}")]
    MalformedConfig { path: String, reason: String },

    /// Server payload cannot be decoded into the model
    #[error("Unparseable response at {path}: {reason}")]
    UnparseableResponse { path: String, reason: String },

    /// Non-2xx HTTP status from the perspective API
    #[error("Transport failure (HTTP {status}): {body}")]
    TransportFailure { status: u16, body: String },

    /// Request never produced a status (connection, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unparseable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnparseableResponse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
