//! # Object Store Backend (Google Cloud Storage JSON API)
//!
//! Implements the `StoreClient` capability over objects under a bucket
//! prefix, using the GCS JSON API v1.
//!
//! ## Overview
//!
//! - Paginated listing under the configured prefix
//! - Media download and `uploadType=media` upload
//! - Fingerprints from the object resource's `md5Hash`, `size`, `updated`
//! - Bearer-token auth (token acquisition belongs to the embedder)
//! - Bounded retry with exponential backoff for 429/5xx and transport
//!   errors
//!
//! The prefix always carries a trailing slash so sibling prefixes never
//! match (`photos` vs `photos-old`). Atomicity of `write` comes from
//! the object store's native put semantics: an object becomes visible
//! only once the upload completes.

pub mod connector;
pub mod error;
pub mod http;
pub mod types;

pub use connector::GcsStore;
pub use error::GcsError;
pub use http::ReqwestHttpClient;
