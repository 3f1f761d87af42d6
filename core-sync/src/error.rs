use store_traits::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Persisted manifest state is unreadable. Fatal for the whole
    /// sync pair: treating it as "no history" would misclassify every
    /// existing key as created on both sides and force spurious
    /// conflicts.
    #[error("Manifest at {path} is corrupt: {message}")]
    ManifestCorruption { path: String, message: String },

    #[error("Manifest IO error at {path}: {source}")]
    ManifestIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// One side could not be enumerated at all. Aborts this pair so
    /// the embedder can move to its next configured target.
    #[error("Target {uri} unavailable: {message}")]
    TargetUnavailable { uri: String, message: String },

    #[error("Conflict resolver failed for {key}: {message}")]
    ResolverFailed { key: String, message: String },

    #[error("Sync cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
