//! Divergence classification
//!
//! Two pure functions: [`derive_action`] turns one side's manifest
//! fingerprint and current fingerprint into an [`Action`], and
//! [`classify`] pairs the two sides' actions into an [`Outcome`].
//! Neither touches a store, which keeps the whole decision table unit
//! testable without IO.

use store_traits::Fingerprint;

use crate::action::{Action, ActionState};
use crate::resolution::{Resolution, Side};

/// Compare one side's manifest fingerprint with its current state.
pub fn derive_action(manifest_fp: Option<&Fingerprint>, current: Option<Fingerprint>) -> Action {
    match (manifest_fp, current) {
        (None, None) => Action::new(ActionState::Unchanged, None),
        (None, Some(fp)) => Action::new(ActionState::Created, Some(fp)),
        (Some(_), None) => Action::new(ActionState::Deleted, None),
        (Some(recorded), Some(fp)) => {
            if recorded.same_content(&fp) {
                Action::new(ActionState::Unchanged, Some(fp))
            } else {
                Action::new(ActionState::Modified, Some(fp))
            }
        }
    }
}

/// What the sync run should do for one key.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Neither side diverged; nothing to do.
    UpToDate,

    /// Exactly one side diverged; apply the planned operation.
    Apply(Resolution),

    /// Both sides deleted the key; drop its manifest entry.
    ForgetEntry,

    /// Both sides changed but now hold identical content; record both
    /// fingerprints without transferring anything.
    Converged {
        fingerprint_1: Fingerprint,
        fingerprint_2: Fingerprint,
    },

    /// Both sides diverged incompatibly; a resolver must pick.
    Conflict { action_1: Action, action_2: Action },
}

/// Pair the two sides' actions for a key into an outcome.
pub fn classify(key: &str, action_1: Action, action_2: Action) -> Outcome {
    use ActionState::*;

    match (action_1.state, action_2.state) {
        (Unchanged, Unchanged) => Outcome::UpToDate,

        // One side changed, the other holds the baseline.
        (Created, Unchanged) => apply_copy(key, &action_1, Side::One),
        (Modified, Unchanged) => apply_copy(key, &action_1, Side::One),
        (Unchanged, Created) => apply_copy(key, &action_2, Side::Two),
        (Unchanged, Modified) => apply_copy(key, &action_2, Side::Two),

        // A deletion only propagates onto an untouched counterpart.
        (Deleted, Unchanged) => Outcome::Apply(Resolution::delete(key, Side::Two)),
        (Unchanged, Deleted) => Outcome::Apply(Resolution::delete(key, Side::One)),

        (Deleted, Deleted) => Outcome::ForgetEntry,

        // Both sides moved. Identical resulting content converges;
        // anything else (edit/edit, edit/delete, create/create with
        // different bytes) is a conflict.
        _ => match (&action_1.fingerprint, &action_2.fingerprint) {
            (Some(fp1), Some(fp2)) if fp1.same_content(fp2) => Outcome::Converged {
                fingerprint_1: fp1.clone(),
                fingerprint_2: fp2.clone(),
            },
            _ => Outcome::Conflict { action_1, action_2 },
        },
    }
}

fn apply_copy(key: &str, action: &Action, source: Side) -> Outcome {
    let fingerprint = match action.fingerprint.clone() {
        Some(fp) => fp,
        // A created or modified action always carries a fingerprint;
        // treat the impossible absence as nothing to do.
        None => return Outcome::UpToDate,
    };
    let resolution = match action.state {
        ActionState::Created => Resolution::create(key, source, fingerprint),
        _ => Resolution::update(key, source, fingerprint),
    };
    Outcome::Apply(resolution)
}
