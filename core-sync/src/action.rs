//! Per-side divergence actions
//!
//! An [`Action`] records how one side of a sync pair has diverged from
//! its manifest fingerprint for a single key. Actions are computed
//! independently per side and never mutated afterwards; the pairing of
//! the two sides' actions drives the decision table in
//! [`crate::classifier`].

use std::fmt;
use store_traits::Fingerprint;

/// Divergence of one side relative to its manifest fingerprint.
///
/// Closed variant set; the classifier matches exhaustively so the
/// decision table stays compiler-checked for completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Matches the manifest fingerprint, or the key was never jointly
    /// observed and is absent here (baseline for a key first seen on
    /// the other side).
    Unchanged,

    /// Present with no manifest entry.
    Created,

    /// Present with a manifest entry and a differing fingerprint.
    Modified,

    /// Absent despite a manifest entry.
    Deleted,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionState::Unchanged => "unchanged",
            ActionState::Created => "created",
            ActionState::Modified => "modified",
            ActionState::Deleted => "deleted",
        };
        write!(f, "{}", label)
    }
}

/// One side's detected divergence for one key.
#[derive(Debug, Clone)]
pub struct Action {
    pub state: ActionState,

    /// The side's current fingerprint; `None` when the key is absent.
    pub fingerprint: Option<Fingerprint>,

    /// The side's current modification timestamp, surfaced so an
    /// interactive conflict collaborator can present "updated at ..."
    /// per side.
    pub remote_datetime: Option<i64>,
}

impl Action {
    pub fn new(state: ActionState, fingerprint: Option<Fingerprint>) -> Self {
        let remote_datetime = fingerprint.as_ref().map(|fp| fp.modified_at);
        Self {
            state,
            fingerprint,
            remote_datetime,
        }
    }
}
