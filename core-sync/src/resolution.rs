//! Planned sync operations
//!
//! A [`Resolution`] is the classifier's (or conflict resolver's)
//! verdict for one key: what to do, which side is the source, which
//! side is the target. Resolutions are inert plans; the worker in
//! [`crate::worker`] is the only component that executes them.

use std::fmt;

use store_traits::Fingerprint;

use crate::action::{Action, ActionState};

/// One of the two stores in a sync pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    One,
    Two,
}

impl Side {
    pub fn other(&self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::One => write!(f, "side 1"),
            Side::Two => write!(f, "side 2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    /// Copy to a target where the key does not yet exist.
    Create,

    /// Copy over an existing object on the target.
    Update,

    /// Remove the key from the target.
    Delete,

    /// Leave both sides untouched; the key resurfaces next run.
    Skip,
}

impl fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolutionAction::Create => "create",
            ResolutionAction::Update => "update",
            ResolutionAction::Delete => "delete",
            ResolutionAction::Skip => "skip",
        };
        write!(f, "{}", label)
    }
}

/// The planned operation for one key.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub key: String,
    pub action: ResolutionAction,

    /// Side supplying content for a copy; `None` for deletes and skips.
    pub source: Option<Side>,

    /// Side being mutated; `None` for skips.
    pub target: Option<Side>,

    /// The source side's fingerprint at classification time, recorded
    /// in the manifest for that side after a successful transfer.
    pub fingerprint: Option<Fingerprint>,
}

impl Resolution {
    pub fn create(key: impl Into<String>, source: Side, fingerprint: Fingerprint) -> Self {
        Self {
            key: key.into(),
            action: ResolutionAction::Create,
            source: Some(source),
            target: Some(source.other()),
            fingerprint: Some(fingerprint),
        }
    }

    pub fn update(key: impl Into<String>, source: Side, fingerprint: Fingerprint) -> Self {
        Self {
            key: key.into(),
            action: ResolutionAction::Update,
            source: Some(source),
            target: Some(source.other()),
            fingerprint: Some(fingerprint),
        }
    }

    pub fn delete(key: impl Into<String>, target: Side) -> Self {
        Self {
            key: key.into(),
            action: ResolutionAction::Delete,
            source: None,
            target: Some(target),
            fingerprint: None,
        }
    }

    pub fn skip(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            action: ResolutionAction::Skip,
            source: None,
            target: None,
            fingerprint: None,
        }
    }

    /// Materialize the winning side of a resolved conflict into a
    /// concrete operation. The winner's own divergence decides the
    /// verb: a created or modified winner is copied across, a deleted
    /// winner propagates the deletion.
    pub fn from_winning_action(key: impl Into<String>, winner: &Action, side: Side) -> Self {
        let key = key.into();
        match winner.state {
            ActionState::Deleted => Resolution::delete(key, side.other()),
            ActionState::Created => match winner.fingerprint.clone() {
                Some(fp) => Resolution::create(key, side, fp),
                None => Resolution::skip(key),
            },
            ActionState::Modified | ActionState::Unchanged => match winner.fingerprint.clone() {
                Some(fp) => Resolution::update(key, side, fp),
                None => Resolution::skip(key),
            },
        }
    }

    /// Bytes this resolution will move; zero for deletes and skips.
    pub fn transfer_size(&self) -> u64 {
        match self.action {
            ResolutionAction::Create | ResolutionAction::Update => {
                self.fingerprint.as_ref().map(|fp| fp.size).unwrap_or(0)
            }
            ResolutionAction::Delete | ResolutionAction::Skip => 0,
        }
    }
}
