//! # Store Capability Traits
//!
//! Contracts shared by every store backend and by the reconciliation
//! engine in `core-sync`.
//!
//! ## Overview
//!
//! A sync pair consists of two independently-mutable key-addressable
//! stores (a local directory tree, a remote object-store prefix). Each
//! side is driven through the same capability trait,
//! [`StoreClient`](store::StoreClient), so the engine never knows which
//! concrete backend it is talking to.
//!
//! ## Contents
//!
//! - [`StoreClient`](store::StoreClient) - list/stat/read/write/delete over one side
//! - [`Fingerprint`](fingerprint::Fingerprint) - content-identity tuple used to detect change
//! - [`key`] - key normalization so both sides address the same logical object
//! - [`HttpClient`](http::HttpClient) - HTTP abstraction used by remote backends
//! - [`MemoryStore`](memory::MemoryStore) - in-memory reference backend for tests
//!
//! ## Error Handling
//!
//! All store operations use [`StoreError`](error::StoreError). A missing
//! key is *not* a failure: `stat` returns `Ok(None)` and classification
//! treats absence as a normal signal. Transient transport errors are
//! distinguished from permanent access errors so the transfer layer can
//! retry the former and give up on the latter.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`. Implementations must tolerate
//! concurrent calls for *distinct* keys; the engine never issues
//! concurrent operations on the same key.

pub mod error;
pub mod fingerprint;
pub mod http;
pub mod key;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use fingerprint::{sha256_hex, Fingerprint};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use key::Key;
pub use memory::MemoryStore;
pub use store::{ByteStream, StoreClient};
