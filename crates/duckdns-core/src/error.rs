//! Error types for the update agent
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the update agent
#[derive(Error, Debug)]
pub enum Error {
    /// No usable configuration in the config store
    #[error("no configuration found")]
    NoConfig,

    /// Stored token ciphertext is too short or fails authentication
    #[error("corrupt secret: {0}")]
    CorruptSecret(String),

    /// Public IP probe failed (non-2xx, timeout, empty body)
    #[error("IP probe failed: {0}")]
    IpProbeFailed(String),

    /// A single resolver probe failed; absorbed into an absent answer,
    /// never escalated to a tick failure
    #[error("resolver {server} failed: {message}")]
    ResolverFailed {
        /// Resolver identifier
        server: String,
        /// Failure description
        message: String,
    },

    /// Provider answered with a KO body
    #[error("update rejected: {0}")]
    UpdateRejected(String),

    /// Transport-level update failure (timeout, connect, non-2xx)
    #[error("update transport error: {0}")]
    UpdateTransport(String),

    /// Audit log I/O failure
    #[error("audit I/O error: {0}")]
    AuditIo(#[from] std::io::Error),

    /// Configuration errors (invalid values, unreadable store)
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a corrupt-secret error
    pub fn corrupt_secret(msg: impl Into<String>) -> Self {
        Self::CorruptSecret(msg.into())
    }

    /// Create an IP probe error
    pub fn ip_probe(msg: impl Into<String>) -> Self {
        Self::IpProbeFailed(msg.into())
    }

    /// Create a per-resolver error
    pub fn resolver(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResolverFailed {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create an update-transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::UpdateTransport(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
