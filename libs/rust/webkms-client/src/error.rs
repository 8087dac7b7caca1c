//! WebKMS error types using thiserror 2.0.
//!
//! Classifies remote key-custody failures so callers can tell policy
//! rejections apart from remote faults.

use thiserror::Error;

/// WebKMS-specific errors.
#[derive(Error, Debug)]
pub enum KmsError {
    /// Remote service rejected or failed the operation
    #[error("KMS operation failed: {0}")]
    Operation(String),

    /// Access-control policy rejected the request
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Keystore or key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists (e.g. duplicate keystore reference id)
    #[error("Duplicate resource: {0}")]
    Duplicate(String),

    /// Remote service unavailable
    #[error("KMS unavailable: {0}")]
    Unavailable(String),

    /// Request timed out
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for WebKMS operations.
pub type KmsResult<T> = Result<T, KmsError>;

impl KmsError {
    /// Check if error is transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_) | Self::Http(_))
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Create a permission denied error.
    #[must_use]
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    #[must_use]
    pub fn from_status(status: u16, context: &str, body: &str) -> Self {
        let detail = if body.is_empty() {
            format!("{context} (status {status})")
        } else {
            format!("{context} (status {status}): {body}")
        };
        match status {
            401 | 403 => Self::PermissionDenied(detail),
            404 => Self::NotFound(detail),
            408 => Self::Timeout(detail),
            409 => Self::Duplicate(detail),
            s if s >= 500 => Self::Unavailable(detail),
            _ => Self::Operation(detail),
        }
    }
}
