//! Content-identity fingerprints
//!
//! A [`Fingerprint`] records what a key looked like on one side at a
//! point in time. Two fingerprints describe the same content iff their
//! `content_hash` matches; size and modification time differ in
//! granularity across backends and are diagnostic only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What a key looked like on one side at observation time.
///
/// `content_hash` is backend-defined: the local filesystem backend uses
/// a SHA-256 hex digest of file content, the object-store backend uses
/// the object's etag. Fingerprints are only ever compared within one
/// side, so the schemes never need to agree - except for the
/// best-effort convergent-edit check, which simply compares the strings
/// and falls back to a conflict when the schemes differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Content size in bytes.
    pub size: u64,

    /// Backend-defined content hash or etag.
    pub content_hash: String,

    /// Modification time as a Unix timestamp. Diagnostic only; never
    /// used to decide equality.
    pub modified_at: i64,
}

impl Fingerprint {
    pub fn new(size: u64, content_hash: impl Into<String>, modified_at: i64) -> Self {
        Self {
            size,
            content_hash: content_hash.into(),
            modified_at,
        }
    }

    /// Fingerprint for in-process content, hashed with SHA-256.
    ///
    /// Used by backends that see raw bytes (local filesystem, the
    /// in-memory test store).
    pub fn of_bytes(data: &[u8], modified_at: i64) -> Self {
        Self {
            size: data.len() as u64,
            content_hash: sha256_hex(data),
            modified_at,
        }
    }

    /// Content equality. This is the *only* comparison classification
    /// relies on.
    pub fn same_content(&self, other: &Fingerprint) -> bool {
        self.content_hash == other.content_hash
    }
}

/// SHA-256 digest rendered as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
