//! Error types for cache operations

use std::fmt::Display;

use thiserror::Error;

/// Main error type for all cache operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key absent or expired
    #[error("cache not found: {0}")]
    NotFound(String),

    /// No driver registered under the requested name
    #[error("unknown driver \"{0}\"")]
    UnknownDriver(String),

    /// Named store was never added to the manager
    #[error("store [{0}] not configured")]
    StoreNotConfigured(String),

    /// A driver with the same name is already registered
    #[error("duplicate driver \"{0}\"")]
    DuplicateDriver(String),

    /// Driver registration is malformed
    #[error("invalid driver: {0}")]
    InvalidDriver(String),

    /// Driver configuration could not be used
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Typed value could not be encoded
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Stored payload could not be decoded
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Backend connection failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Underlying medium failed
    #[error("{operation} failed for key '{key}': {message}")]
    Backend {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Loader passed to `load` failed
    #[error("loader error: {0}")]
    Loader(String),
}

impl CacheError {
    /// Wrap a medium failure with the operation and key it happened on.
    pub fn backend(operation: &'static str, key: impl Into<String>, err: impl Display) -> Self {
        CacheError::Backend {
            operation,
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Wrap an application error raised inside a loader.
    pub fn loader(err: impl Display) -> Self {
        CacheError::Loader(err.to_string())
    }

    /// True for the one expected, recoverable read failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
