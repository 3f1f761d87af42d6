//! Conflict resolution
//!
//! When both sides of a pair diverge incompatibly for the same key the
//! worker hands the pair of actions to a [`ConflictResolver`]. The
//! resolver only picks a winner (or skips); turning the choice into a
//! concrete operation stays in the worker so all policies share the
//! same execution path.
//!
//! Embedders with a UI implement the trait themselves; the shipped
//! policies cover unattended runs.

use async_trait::async_trait;

use crate::action::Action;
use crate::error::Result;
use crate::resolution::Side;

/// A resolver's verdict for one conflicted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// The named side's state wins and is applied to the other side.
    KeepSide(Side),

    /// Leave both sides untouched; the conflict resurfaces next run.
    Skip,
}

/// Policy callback deciding conflicted keys.
///
/// Implementations may block on user input; the worker resolves
/// conflicts sequentially so prompts never interleave.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn resolve(
        &self,
        key: &str,
        action_1: &Action,
        uri_1: &str,
        action_2: &Action,
        uri_2: &str,
    ) -> Result<ConflictChoice>;
}

/// Always keeps a fixed side, regardless of which side changed.
pub struct PreferSide(pub Side);

#[async_trait]
impl ConflictResolver for PreferSide {
    async fn resolve(
        &self,
        _key: &str,
        _action_1: &Action,
        _uri_1: &str,
        _action_2: &Action,
        _uri_2: &str,
    ) -> Result<ConflictChoice> {
        Ok(ConflictChoice::KeepSide(self.0))
    }
}

/// Skips every conflict; the safe default for unattended runs.
pub struct SkipConflicts;

#[async_trait]
impl ConflictResolver for SkipConflicts {
    async fn resolve(
        &self,
        _key: &str,
        _action_1: &Action,
        _uri_1: &str,
        _action_2: &Action,
        _uri_2: &str,
    ) -> Result<ConflictChoice> {
        Ok(ConflictChoice::Skip)
    }
}
