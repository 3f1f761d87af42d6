//! Sync manifest persistence
//!
//! The manifest records, per key, the fingerprint each side held the
//! last time the pair was successfully reconciled. It is the baseline
//! the classifier compares against; losing it degrades every key to a
//! first-contact classification but never corrupts data.
//!
//! One manifest file exists per ordered store pair, named by a digest
//! of the two URIs so distinct pairs never share state. Writes go
//! through a temp file and rename so a crash leaves either the old or
//! the new manifest, never a torn one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use store_traits::{sha256_hex, Fingerprint};
use tracing::debug;

use crate::error::{Result, SyncError};

const MANIFEST_VERSION: u32 = 1;

/// Last-synced fingerprints for one key, one per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub fingerprint_1: Fingerprint,
    pub fingerprint_2: Fingerprint,
}

impl ManifestEntry {
    pub fn new(fingerprint_1: Fingerprint, fingerprint_2: Fingerprint) -> Self {
        Self {
            fingerprint_1,
            fingerprint_2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestDocument {
    version: u32,
    entries: BTreeMap<String, ManifestEntry>,
}

/// On-disk manifest for one store pair.
#[derive(Debug)]
pub struct SyncManifest {
    path: PathBuf,
    entries: BTreeMap<String, ManifestEntry>,
}

impl SyncManifest {
    /// Manifest location for the ordered pair `(uri_1, uri_2)`.
    ///
    /// The ordering is part of the identity: syncing A with B and B
    /// with A are distinct pairs with distinct baselines.
    pub fn store_path(state_dir: &Path, uri_1: &str, uri_2: &str) -> PathBuf {
        let digest = sha256_hex(format!("{}\n{}", uri_1, uri_2).as_bytes());
        state_dir.join(format!("{}.json", digest))
    }

    /// Load the manifest at `path`, starting empty when the file does
    /// not exist yet.
    ///
    /// An unreadable or unparseable manifest aborts the run: guessing
    /// at a baseline risks misclassifying edits as creates and
    /// overwriting data.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no manifest yet, starting empty");
                return Ok(Self {
                    path,
                    entries: BTreeMap::new(),
                });
            }
            Err(err) => {
                return Err(SyncError::ManifestIo {
                    path: path.display().to_string(),
                    source: err,
                })
            }
        };

        let document: ManifestDocument =
            serde_json::from_slice(&raw).map_err(|err| SyncError::ManifestCorruption {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;

        if document.version != MANIFEST_VERSION {
            return Err(SyncError::ManifestCorruption {
                path: path.display().to_string(),
                message: format!("unsupported manifest version {}", document.version),
            });
        }

        debug!(
            path = %path.display(),
            entries = document.entries.len(),
            "loaded manifest"
        );
        Ok(Self {
            path,
            entries: document.entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// All recorded keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the current entries via temp file and rename.
    pub async fn flush(&self) -> Result<()> {
        let document = ManifestDocument {
            version: MANIFEST_VERSION,
            entries: self.entries.clone(),
        };
        let serialized =
            serde_json::to_vec_pretty(&document).map_err(|err| SyncError::ManifestCorruption {
                path: self.path.display().to_string(),
                message: err.to_string(),
            })?;

        let io_err = |err: std::io::Error| SyncError::ManifestIo {
            path: self.path.display().to_string(),
            source: err,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &serialized)
            .await
            .map_err(io_err)?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(io_err)?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "flushed manifest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(hash: &str) -> Fingerprint {
        Fingerprint::new(1, hash, 0)
    }

    #[test]
    fn store_path_is_order_sensitive() {
        let dir = Path::new("/state");
        let forward = SyncManifest::store_path(dir, "mem://a", "mem://b");
        let backward = SyncManifest::store_path(dir, "mem://b", "mem://a");
        assert_ne!(forward, backward);
        assert!(forward.extension().is_some_and(|ext| ext == "json"));
    }

    #[tokio::test]
    async fn missing_manifest_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let manifest = SyncManifest::load(path).await.unwrap();
        assert!(manifest.is_empty());
    }

    #[tokio::test]
    async fn entries_survive_flush_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.json");

        let mut manifest = SyncManifest::load(path.clone()).await.unwrap();
        manifest.put("a.txt", ManifestEntry::new(fp("one"), fp("two")));
        manifest.put("b.txt", ManifestEntry::new(fp("x"), fp("y")));
        manifest.remove("b.txt");
        manifest.flush().await.unwrap();

        let reloaded = SyncManifest::load(path).await.unwrap();
        assert_eq!(reloaded.len(), 1);
        let entry = reloaded.get("a.txt").unwrap();
        assert_eq!(entry.fingerprint_1.content_hash, "one");
        assert_eq!(entry.fingerprint_2.content_hash, "two");
    }

    #[tokio::test]
    async fn corrupt_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = SyncManifest::load(path).await.unwrap_err();
        assert!(matches!(err, SyncError::ManifestCorruption { .. }));
    }

    #[tokio::test]
    async fn unknown_version_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pair.json");
        tokio::fs::write(&path, br#"{"version": 99, "entries": {}}"#)
            .await
            .unwrap();

        let err = SyncManifest::load(path).await.unwrap_err();
        assert!(matches!(err, SyncError::ManifestCorruption { .. }));
    }

    #[tokio::test]
    async fn flush_creates_missing_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pair.json");
        let mut manifest = SyncManifest::load(path.clone()).await.unwrap();
        manifest.put("a", ManifestEntry::new(fp("1"), fp("2")));
        manifest.flush().await.unwrap();
        assert!(path.exists());
    }
}
