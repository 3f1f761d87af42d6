//! Bidirectional reconciliation engine
//!
//! Keeps two stores convergent by comparing each side against the
//! fingerprints recorded at the last successful sync, instead of
//! comparing the sides against each other. That baseline is what lets
//! the engine tell "created here" from "deleted there" and detect true
//! conflicts instead of silently picking a winner.
//!
//! # Components
//!
//! - [`manifest`]: per-pair persistence of last-synced fingerprints
//! - [`classifier`]: pure decision table from fingerprints to outcomes
//! - [`conflict`]: pluggable policy for keys both sides changed
//! - [`progress`]: byte-level transfer accounting
//! - [`worker`]: the concurrent executor tying it all together
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use core_sync::SyncWorker;
//! use store_traits::MemoryStore;
//!
//! # async fn run() -> core_sync::Result<()> {
//! let a = Arc::new(MemoryStore::new("mem://a"));
//! let b = Arc::new(MemoryStore::new("mem://b"));
//! let summary = SyncWorker::new(a, b, "/var/lib/pairsync").sync().await?;
//! println!("created {}, updated {}", summary.created, summary.updated);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod classifier;
pub mod conflict;
pub mod error;
pub mod manifest;
pub mod progress;
pub mod resolution;
pub mod worker;

pub use action::{Action, ActionState};
pub use classifier::{classify, derive_action, Outcome};
pub use conflict::{ConflictChoice, ConflictResolver, PreferSide, SkipConflicts};
pub use error::{Result, SyncError};
pub use manifest::{ManifestEntry, SyncManifest};
pub use progress::{CountingReporter, NullReporter, ProgressReporter};
pub use resolution::{Resolution, ResolutionAction, Side};
pub use worker::{KeyFailure, SyncConfig, SyncSummary, SyncWorker};
