//! Storage error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for blob store calls.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object not found in storage.
    #[error("file not found: {key}")]
    NotFound {
        /// Storage key that was not found.
        key: String,
    },

    /// Presign operation not supported by provider.
    #[error("presign operation not supported by storage provider")]
    PresignNotSupported,

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// OpenDAL operation error.
    #[error("storage operation failed: {0}")]
    Operation(String),

    /// Invalid storage key format.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// The remote call did not settle before its deadline.
    #[error("storage {operation} timed out after {}s", after.as_secs())]
    Timeout {
        /// Which call timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The caller's cancellation token fired before the call settled.
    #[error("storage call aborted by caller")]
    Aborted,
}

impl StorageError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Create an invalid key error.
    #[must_use]
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Create a timeout error.
    #[must_use]
    pub const fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Map an OpenDAL error raised while working on `key`.
    #[must_use]
    pub fn from_opendal(err: &opendal::Error, key: &str) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::not_found(key),
            opendal::ErrorKind::Unsupported => Self::PresignNotSupported,
            _ => Self::Operation(err.to_string()),
        }
    }

    /// Whether the error carries a message worth showing to a user.
    ///
    /// Backends sometimes fail without any detail; callers then fall back to
    /// a generic message.
    #[must_use]
    pub fn has_message(&self) -> bool {
        !matches!(self, Self::Operation(msg) if msg.trim().is_empty())
    }

    /// True for [`StorageError::Aborted`].
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
