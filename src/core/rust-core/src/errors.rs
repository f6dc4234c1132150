//! The error taxonomy of the data plane.

use nexus_extensibility::extensibility::DataSourceError;
use thiserror::Error;

/// A result type whose error is [NexusError].
pub type Result<T> = std::result::Result<T, NexusError>;

/// The error taxonomy of the data plane, grouped by what a client observes.
#[derive(Debug, Error)]
pub enum NexusError {
    /// A malformed request: bad path, non-multiple sample period,
    /// non-monotonic time range, step out of range.
    #[error("validation error: {0}")]
    Validation(String),

    /// An unknown catalog, resource or attachment, or an exceeded soft-link
    /// resolution depth.
    #[error("not found: {0}")]
    NotFound(String),

    /// An authorization check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// An I/O conflict on an attachment write or delete.
    #[error("locked: {0}")]
    Locked(String),

    /// The minimum allocation cannot be satisfied. Fatal to the current
    /// read, sibling reads keep running.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// The operation was cancelled.
    #[error("the operation was cancelled")]
    Cancelled,

    /// An I/O error outside the attachment conflict paths.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NexusError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        NexusError::Validation(message.into())
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        NexusError::NotFound(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        NexusError::Internal(message.into())
    }
}

impl From<DataSourceError> for NexusError {
    fn from(error: DataSourceError) -> Self {
        match error {
            DataSourceError::NotFound(message) => NexusError::NotFound(message),
            DataSourceError::Cancelled => NexusError::Cancelled,
            other => NexusError::Internal(other.to_string()),
        }
    }
}
