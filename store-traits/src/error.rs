use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The key does not exist on this side. Expected during
    /// classification; never surfaced as a sync failure.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Credentials or permissions problem. Fatal for the affected key,
    /// never retried.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Network or remote-store hiccup. Eligible for bounded retry at
    /// the transfer layer.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The backend returned something the client could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether a retry at the transfer layer is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
