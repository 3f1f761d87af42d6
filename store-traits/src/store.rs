//! Store capability interface
//!
//! One trait covers both sides of a sync pair. Implementations exist
//! for the local filesystem (`provider-local`), a remote object store
//! (`provider-gcs`), and an in-memory reference backend
//! ([`crate::memory::MemoryStore`]).

use async_trait::async_trait;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::key::Key;

/// Owned async byte stream handed between stores during a transfer.
pub type ByteStream = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Uniform capability interface over one side of a sync pair.
///
/// Classification only ever calls the read-only half (`list_keys`,
/// `stat`); mutation happens exclusively while applying a resolution.
///
/// # Contract
///
/// - `list_keys` is finite and restartable: a fresh call re-enumerates,
///   and one call reflects a consistent-enough snapshot for the
///   duration of one classification pass.
/// - `write` is atomic from the caller's perspective: no partially
///   written key is observable by a concurrent `stat` or `open_read` on
///   that key. The filesystem backend writes to a temp file and
///   renames; object stores get this from their native put semantics.
/// - Concurrent calls for distinct keys must be tolerated. The engine
///   never issues concurrent operations on the same key.
///
/// # Example
///
/// ```ignore
/// use store_traits::StoreClient;
///
/// async fn exists(store: &dyn StoreClient, key: &str) -> store_traits::Result<bool> {
///     Ok(store.stat(key).await?.is_some())
/// }
/// ```
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Enumerate every key currently present on this side.
    async fn list_keys(&self) -> Result<Vec<Key>>;

    /// Fingerprint of a key, or `None` if the key is absent.
    ///
    /// Absence is a normal classification signal, not a failure.
    async fn stat(&self, key: &str) -> Result<Option<Fingerprint>>;

    /// Open the key's content for reading.
    ///
    /// The returned stream is a scoped acquisition; callers drop it on
    /// every exit path, including transfer failure.
    async fn open_read(&self, key: &str) -> Result<ByteStream>;

    /// Write the key's content from a stream, returning the
    /// destination's post-write fingerprint.
    ///
    /// `expected_size` is the source's size in bytes; implementations
    /// may use it for preallocation and must fail with a protocol error
    /// if the stream ends short or long.
    async fn write(&self, key: &str, reader: ByteStream, expected_size: u64)
        -> Result<Fingerprint>;

    /// Remove a key. Deleting an absent key is an error (`NotFound`).
    async fn delete(&self, key: &str) -> Result<()>;

    /// Identity URI for logging and manifest addressing. Never used in
    /// content comparisons.
    fn uri(&self) -> String;
}
