//! Error types for the GCS provider

use store_traits::StoreError;
use thiserror::Error;

/// GCS provider errors
#[derive(Error, Debug)]
pub enum GcsError {
    /// Token rejected or insufficient permissions
    #[error("Access denied (status {status_code}): {message}")]
    AccessDenied { status_code: u16, message: String },

    /// API request returned an unexpected error
    #[error("GCS API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Object does not exist
    #[error("Object not found: {key}")]
    ObjectNotFound { key: String },

    /// Retries against a rate limit or server error were exhausted
    #[error("Request failed after {attempts} attempts (last status {status_code})")]
    RetriesExhausted { attempts: u32, status_code: u16 },

    /// Failed to parse an API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Store error from the HTTP layer
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for GCS operations
pub type Result<T> = std::result::Result<T, GcsError>;

impl From<GcsError> for StoreError {
    fn from(error: GcsError) -> Self {
        match error {
            GcsError::AccessDenied {
                status_code,
                message,
            } => StoreError::AccessDenied(format!("status {}: {}", status_code, message)),
            GcsError::ObjectNotFound { key } => StoreError::NotFound(key),
            GcsError::RetriesExhausted {
                attempts,
                status_code,
            } => StoreError::Transient(format!(
                "request failed after {} attempts (last status {})",
                attempts, status_code
            )),
            GcsError::ApiError {
                status_code,
                message,
            } => StoreError::Protocol(format!("status {}: {}", status_code, message)),
            GcsError::ParseError(msg) => StoreError::Protocol(msg),
            GcsError::Store(e) => e,
        }
    }
}
