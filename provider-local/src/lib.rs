//! # Local Filesystem Store Backend
//!
//! Implements the `StoreClient` capability over a local directory tree
//! using `tokio::fs`.
//!
//! ## Overview
//!
//! Keys are paths relative to a root directory, normalized to forward
//! slashes. Content fingerprints are SHA-256 digests of file bytes;
//! modification times are diagnostic only. Writes land in a hidden
//! temp file in the destination directory and are renamed into place,
//! so a concurrent `stat` or `open_read` never observes a partially
//! written key.

pub mod store;

pub use store::LocalStore;
