//! In-memory store backend
//!
//! Reference implementation of [`StoreClient`] backed by a `HashMap`.
//! The engine's tests drive sync passes against two of these; per-key
//! fault injection covers the failure-isolation paths without a real
//! backend misbehaving on cue.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;
use tokio::io::AsyncReadExt;

use crate::error::{Result, StoreError};
use crate::fingerprint::Fingerprint;
use crate::key::Key;
use crate::store::{ByteStream, StoreClient};

struct Entry {
    data: Bytes,
    modified_at: i64,
}

/// HashMap-backed store with SHA-256 fingerprints.
///
/// Locks are never held across await points; all state is process-local.
pub struct MemoryStore {
    uri: String,
    objects: Mutex<HashMap<Key, Entry>>,
    fail_writes: Mutex<HashSet<Key>>,
    fail_reads: Mutex<HashSet<Key>>,
}

impl MemoryStore {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            objects: Mutex::new(HashMap::new()),
            fail_writes: Mutex::new(HashSet::new()),
            fail_reads: Mutex::new(HashSet::new()),
        }
    }

    /// Insert content directly, bypassing the `write` contract. Test
    /// setup helper.
    pub fn seed(&self, key: impl Into<Key>, data: &[u8]) {
        self.seed_at(key, data, chrono::Utc::now().timestamp());
    }

    /// Insert content with an explicit modification time.
    pub fn seed_at(&self, key: impl Into<Key>, data: &[u8], modified_at: i64) {
        self.objects.lock().unwrap().insert(
            key.into(),
            Entry {
                data: Bytes::copy_from_slice(data),
                modified_at,
            },
        );
    }

    /// Current content of a key, if present.
    pub fn contents(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|e| e.data.clone())
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent `write` to `key` fail with a transient
    /// error.
    pub fn fail_writes_on(&self, key: impl Into<Key>) {
        self.fail_writes.lock().unwrap().insert(key.into());
    }

    /// Make every subsequent `open_read` of `key` fail with a transient
    /// error.
    pub fn fail_reads_on(&self, key: impl Into<Key>) {
        self.fail_reads.lock().unwrap().insert(key.into());
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn list_keys(&self) -> Result<Vec<Key>> {
        let mut keys: Vec<Key> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn stat(&self, key: &str) -> Result<Option<Fingerprint>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|e| Fingerprint::of_bytes(&e.data, e.modified_at)))
    }

    async fn open_read(&self, key: &str) -> Result<ByteStream> {
        if self.fail_reads.lock().unwrap().contains(key) {
            return Err(StoreError::Transient(format!(
                "injected read failure for {}",
                key
            )));
        }

        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        Ok(Box::new(Cursor::new(data.to_vec())))
    }

    async fn write(
        &self,
        key: &str,
        mut reader: ByteStream,
        expected_size: u64,
    ) -> Result<Fingerprint> {
        if self.fail_writes.lock().unwrap().contains(key) {
            return Err(StoreError::Transient(format!(
                "injected write failure for {}",
                key
            )));
        }

        let mut data = Vec::with_capacity(expected_size as usize);
        reader.read_to_end(&mut data).await?;
        if data.len() as u64 != expected_size {
            return Err(StoreError::Protocol(format!(
                "short write for {}: expected {} bytes, got {}",
                key,
                expected_size,
                data.len()
            )));
        }

        let modified_at = chrono::Utc::now().timestamp();
        let fingerprint = Fingerprint::of_bytes(&data, modified_at);
        self.objects.lock().unwrap().insert(
            key.to_string(),
            Entry {
                data: Bytes::from(data),
                modified_at,
            },
        );
        Ok(fingerprint)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn uri(&self) -> String {
        self.uri.clone()
    }
}
