//! Local filesystem implementation of `StoreClient`

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use store_traits::error::{Result, StoreError};
use store_traits::fingerprint::Fingerprint;
use store_traits::key::{self, Key};
use store_traits::store::{ByteStream, StoreClient};

/// Prefix for in-flight temp files. Listings skip these so an
/// interrupted transfer never surfaces as a phantom key.
const TEMP_PREFIX: &str = ".pairsync.tmp.";

/// Read buffer size for hashing and copying.
const BUF_SIZE: usize = 64 * 1024;

/// `StoreClient` over a directory tree.
///
/// # Example
///
/// ```ignore
/// use provider_local::LocalStore;
///
/// let store = LocalStore::new("/home/me/photos");
/// let keys = store.list_keys().await?;
/// ```
pub struct LocalStore {
    root: PathBuf,
    uri: String,
}

impl LocalStore {
    /// Create a store rooted at `root`. The directory does not need to
    /// exist yet; it is created on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let uri = key::ensure_trailing_slash(&format!("file://{}", root.display()));
        Self { root, uri }
    }

    fn absolute(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn map_io_error(key: &str, e: std::io::Error) -> StoreError {
        match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StoreError::AccessDenied(format!("{}: {}", key, e))
            }
            _ => StoreError::Io(e),
        }
    }

    /// Stream a file through SHA-256, returning `(size, hex digest)`.
    async fn hash_file(path: &Path) -> std::io::Result<(u64, String)> {
        let mut file = fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; BUF_SIZE];
        let mut size = 0u64;

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            size += n as u64;
        }

        Ok((size, hex::encode(hasher.finalize())))
    }

    fn modified_timestamp(metadata: &std::fs::Metadata) -> i64 {
        metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let absolute = self.absolute(key);
        let file_name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        absolute.with_file_name(format!("{}{}", TEMP_PREFIX, file_name))
    }
}

#[async_trait]
impl StoreClient for LocalStore {
    #[instrument(skip(self), fields(uri = %self.uri))]
    async fn list_keys(&self) -> Result<Vec<Key>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // A missing root simply has no keys yet.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && dir == self.root => {
                    return Ok(Vec::new());
                }
                Err(e) => return Err(Self::map_io_error(&dir.to_string_lossy(), e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::map_io_error(&dir.to_string_lossy(), e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Self::map_io_error(&path.to_string_lossy(), e))?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name.starts_with(TEMP_PREFIX) {
                        continue;
                    }
                    if let Ok(relative) = path.strip_prefix(&self.root) {
                        keys.push(key::normalize(&relative.to_string_lossy()));
                    }
                }
            }
        }

        keys.sort();
        debug!(count = keys.len(), "Listed local keys");
        Ok(keys)
    }

    async fn stat(&self, key: &str) -> Result<Option<Fingerprint>> {
        let path = self.absolute(key);
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::map_io_error(key, e)),
        };

        if !metadata.is_file() {
            return Ok(None);
        }

        let (size, content_hash) = Self::hash_file(&path)
            .await
            .map_err(|e| Self::map_io_error(key, e))?;

        Ok(Some(Fingerprint::new(
            size,
            content_hash,
            Self::modified_timestamp(&metadata),
        )))
    }

    async fn open_read(&self, key: &str) -> Result<ByteStream> {
        let file = fs::File::open(self.absolute(key))
            .await
            .map_err(|e| Self::map_io_error(key, e))?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self, reader), fields(uri = %self.uri, key = %key, expected_size))]
    async fn write(
        &self,
        key: &str,
        mut reader: ByteStream,
        expected_size: u64,
    ) -> Result<Fingerprint> {
        let final_path = self.absolute(key);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::map_io_error(key, e))?;
        }

        let temp_path = self.temp_path(key);
        let result = self
            .write_temp(&temp_path, &mut reader, key, expected_size)
            .await;

        match result {
            Ok(fingerprint) => {
                fs::rename(&temp_path, &final_path)
                    .await
                    .map_err(|e| Self::map_io_error(key, e))?;
                debug!(key, size = fingerprint.size, "Wrote local key");
                Ok(fingerprint)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(key, error = %cleanup, "Failed to remove temp file");
                    }
                }
                Err(e)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        fs::remove_file(self.absolute(key))
            .await
            .map_err(|e| Self::map_io_error(key, e))?;
        debug!(key, "Deleted local key");
        Ok(())
    }

    fn uri(&self) -> String {
        self.uri.clone()
    }
}

impl LocalStore {
    /// Copy the stream into `temp_path`, hashing as it goes. The caller
    /// renames on success and removes the temp file on failure.
    async fn write_temp(
        &self,
        temp_path: &Path,
        reader: &mut ByteStream,
        key: &str,
        expected_size: u64,
    ) -> Result<Fingerprint> {
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| Self::map_io_error(key, e))?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; BUF_SIZE];
        let mut written = 0u64;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n])
                .await
                .map_err(|e| Self::map_io_error(key, e))?;
            written += n as u64;
        }

        file.flush().await.map_err(|e| Self::map_io_error(key, e))?;

        if written != expected_size {
            return Err(StoreError::Protocol(format!(
                "short write for {}: expected {} bytes, got {}",
                key, expected_size, written
            )));
        }

        Ok(Fingerprint::new(
            written,
            hex::encode(hasher.finalize()),
            chrono::Utc::now().timestamp(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn stream(data: &[u8]) -> ByteStream {
        Box::new(Cursor::new(data.to_vec()))
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let written = store.write("a/b/c.txt", stream(b"content"), 7).await.unwrap();
        assert_eq!(written.size, 7);

        let mut reader = store.open_read("a/b/c.txt").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"content");

        let statted = store.stat("a/b/c.txt").await.unwrap().unwrap();
        assert!(written.same_content(&statted));
    }

    #[tokio::test]
    async fn listing_is_recursive_normalized_and_sorted() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        store.write("z.txt", stream(b"z"), 1).await.unwrap();
        store.write("a/nested.txt", stream(b"n"), 1).await.unwrap();
        store.write("a/b/deep.txt", stream(b"d"), 1).await.unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["a/b/deep.txt", "a/nested.txt", "z.txt"]);
    }

    #[tokio::test]
    async fn listing_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("does-not-exist"));
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn temp_files_are_not_listed() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.write("real.txt", stream(b"x"), 1).await.unwrap();

        std::fs::write(
            dir.path().join(format!("{}orphan.txt", TEMP_PREFIX)),
            b"partial",
        )
        .unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["real.txt"]);
    }

    #[tokio::test]
    async fn short_write_leaves_no_destination() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let err = store.write("x.txt", stream(b"abc"), 10).await.unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));
        assert!(store.stat("x.txt").await.unwrap().is_none());
        // The temp file was cleaned up too.
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stat_and_delete_of_absent_key() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        assert!(store.stat("ghost.txt").await.unwrap().is_none());
        assert!(matches!(
            store.delete("ghost.txt").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn content_change_changes_fingerprint() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let before = store.write("f.txt", stream(b"one"), 3).await.unwrap();
        let after = store.write("f.txt", stream(b"two"), 3).await.unwrap();
        assert!(!before.same_content(&after));
    }
}
