//! Sync execution
//!
//! [`SyncWorker`] drives one full reconciliation pass over a store
//! pair: load the manifest, enumerate and fingerprint both sides,
//! classify every key, resolve conflicts, then execute the planned
//! operations on a bounded concurrent pool while advancing the
//! manifest entry by entry. A key that fails is reported and left for
//! the next run; it never aborts the pass.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use store_traits::{Fingerprint, StoreClient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::classifier::{classify, derive_action, Outcome};
use crate::conflict::{ConflictChoice, ConflictResolver, SkipConflicts};
use crate::error::{Result, SyncError};
use crate::manifest::{ManifestEntry, SyncManifest};
use crate::progress::{NullReporter, ProgressReporter};
use crate::resolution::{Resolution, ResolutionAction, Side};

/// Concurrency for the fingerprinting pass, independent of transfer
/// concurrency since stats are cheap.
const STAT_CONCURRENCY: usize = 16;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Tunables for one worker.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on concurrently executing transfers.
    pub max_concurrent_transfers: usize,

    /// Extra attempts per key after a transient transfer failure.
    pub transfer_retries: u32,

    /// Classify and report but mutate nothing, manifest included.
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 4,
            transfer_retries: 2,
            dry_run: false,
        }
    }
}

/// One key the run could not complete.
#[derive(Debug, Clone)]
pub struct KeyFailure {
    pub key: String,
    pub target_uri: String,
    pub message: String,
}

/// Outcome counters for one reconciliation pass.
#[derive(Debug, Default, Clone)]
pub struct SyncSummary {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub skipped_conflicts: u64,
    pub converged: u64,
    pub bytes_transferred: u64,
    pub failed: Vec<KeyFailure>,
}

impl SyncSummary {
    /// True when every planned operation completed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reconciles one ordered store pair.
pub struct SyncWorker {
    client_1: Arc<dyn StoreClient>,
    client_2: Arc<dyn StoreClient>,
    resolver: Arc<dyn ConflictResolver>,
    progress: Arc<dyn ProgressReporter>,
    config: SyncConfig,
    state_dir: PathBuf,
    cancellation: CancellationToken,
}

impl SyncWorker {
    pub fn new(
        client_1: Arc<dyn StoreClient>,
        client_2: Arc<dyn StoreClient>,
        state_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client_1,
            client_2,
            resolver: Arc::new(SkipConflicts),
            progress: Arc::new(NullReporter),
            config: SyncConfig::default(),
            state_dir: state_dir.into(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Token that aborts this worker's run when cancelled. In-flight
    /// transfers complete; no new ones are issued.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn client(&self, side: Side) -> &Arc<dyn StoreClient> {
        match side {
            Side::One => &self.client_1,
            Side::Two => &self.client_2,
        }
    }

    /// Run one full reconciliation pass.
    #[instrument(skip(self), fields(uri_1 = %self.client_1.uri(), uri_2 = %self.client_2.uri(), dry_run = self.config.dry_run))]
    pub async fn sync(&self) -> Result<SyncSummary> {
        let uri_1 = self.client_1.uri();
        let uri_2 = self.client_2.uri();

        let manifest_path = SyncManifest::store_path(&self.state_dir, &uri_1, &uri_2);
        let mut manifest = SyncManifest::load(manifest_path).await?;

        let keys_1 = self
            .client_1
            .list_keys()
            .await
            .map_err(|err| SyncError::TargetUnavailable {
                uri: uri_1.clone(),
                message: err.to_string(),
            })?;
        let keys_2 = self
            .client_2
            .list_keys()
            .await
            .map_err(|err| SyncError::TargetUnavailable {
                uri: uri_2.clone(),
                message: err.to_string(),
            })?;

        let mut summary = SyncSummary::default();

        // Every key either side holds now, plus every key the manifest
        // remembers, so deletions on both sides still get classified.
        let present_1: HashSet<String> = keys_1.into_iter().collect();
        let present_2: HashSet<String> = keys_2.into_iter().collect();
        let mut universe: BTreeSet<String> = present_1.iter().cloned().collect();
        universe.extend(present_2.iter().cloned());
        universe.extend(manifest.keys().cloned());

        debug!(keys = universe.len(), "classifying key universe");

        let mut stats: Vec<_> = futures::stream::iter(universe.into_iter().map(|key| {
            let stat_1 = present_1.contains(&key);
            let stat_2 = present_2.contains(&key);
            let client_1 = Arc::clone(&self.client_1);
            let client_2 = Arc::clone(&self.client_2);
            async move {
                let (fp_1, fp_2) = tokio::join!(
                    async {
                        if stat_1 {
                            client_1.stat(&key).await
                        } else {
                            Ok(None)
                        }
                    },
                    async {
                        if stat_2 {
                            client_2.stat(&key).await
                        } else {
                            Ok(None)
                        }
                    }
                );
                (key, fp_1, fp_2)
            }
        }))
        .buffer_unordered(STAT_CONCURRENCY)
        .collect()
        .await;
        stats.sort_by(|a, b| a.0.cmp(&b.0));

        let mut pending: Vec<Resolution> = Vec::new();
        let mut conflicts = Vec::new();
        let mut manifest_dirty = false;

        for (key, fp_1, fp_2) in stats {
            let fp_1 = match fp_1 {
                Ok(fp) => fp,
                Err(err) => {
                    warn!(key = %key, uri = %uri_1, error = %err, "fingerprinting failed");
                    summary.failed.push(KeyFailure {
                        key,
                        target_uri: uri_1.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            let fp_2 = match fp_2 {
                Ok(fp) => fp,
                Err(err) => {
                    warn!(key = %key, uri = %uri_2, error = %err, "fingerprinting failed");
                    summary.failed.push(KeyFailure {
                        key,
                        target_uri: uri_2.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let entry = manifest.get(&key);
            let action_1 = derive_action(entry.map(|e| &e.fingerprint_1), fp_1);
            let action_2 = derive_action(entry.map(|e| &e.fingerprint_2), fp_2);

            match classify(&key, action_1, action_2) {
                Outcome::UpToDate => {}
                Outcome::ForgetEntry => {
                    debug!(key = %key, "deleted on both sides, dropping manifest entry");
                    if !self.config.dry_run {
                        manifest.remove(&key);
                        manifest_dirty = true;
                    }
                }
                Outcome::Converged {
                    fingerprint_1,
                    fingerprint_2,
                } => {
                    info!(key = %key, "both sides already hold matching content");
                    summary.converged += 1;
                    if !self.config.dry_run {
                        manifest.put(&key, ManifestEntry::new(fingerprint_1, fingerprint_2));
                        manifest_dirty = true;
                    }
                }
                Outcome::Apply(resolution) => pending.push(resolution),
                Outcome::Conflict { action_1, action_2 } => {
                    conflicts.push((key, action_1, action_2));
                }
            }
        }

        // Conflicts are decided sequentially up front: resolvers may
        // prompt a user, and deciding everything first makes the byte
        // total exact before the first transfer starts.
        for (key, action_1, action_2) in conflicts {
            let choice = match self
                .resolver
                .resolve(&key, &action_1, &uri_1, &action_2, &uri_2)
                .await
            {
                Ok(choice) => choice,
                Err(err) => {
                    warn!(key = %key, error = %err, "conflict resolver failed");
                    // A conflict concerns both sides; name them both.
                    summary.failed.push(KeyFailure {
                        key,
                        target_uri: format!("{}, {}", uri_1, uri_2),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            match choice {
                ConflictChoice::Skip => {
                    info!(key = %key, "conflict skipped, will resurface next run");
                    summary.skipped_conflicts += 1;
                }
                ConflictChoice::KeepSide(side) => {
                    let winner = match side {
                        Side::One => &action_1,
                        Side::Two => &action_2,
                    };
                    let resolution = Resolution::from_winning_action(&key, winner, side);
                    if resolution.action == ResolutionAction::Skip {
                        summary.skipped_conflicts += 1;
                    } else {
                        pending.push(resolution);
                    }
                }
            }
        }

        if manifest_dirty {
            manifest.flush().await?;
        }

        let total_bytes: u64 = pending.iter().map(Resolution::transfer_size).sum();
        self.progress.start(total_bytes);
        info!(
            operations = pending.len(),
            total_bytes, "classification complete"
        );

        if self.config.dry_run {
            for resolution in &pending {
                self.announce(resolution, &uri_1, &uri_2);
                match resolution.action {
                    ResolutionAction::Create => summary.created += 1,
                    ResolutionAction::Update => summary.updated += 1,
                    ResolutionAction::Delete => summary.deleted += 1,
                    ResolutionAction::Skip => {}
                }
            }
            self.progress.finish();
            return Ok(summary);
        }

        let uri_1_ref = uri_1.as_str();
        let uri_2_ref = uri_2.as_str();
        let mut transfers = futures::stream::iter(pending.into_iter().map(|resolution| {
            let token = self.cancellation.clone();
            async move {
                if token.is_cancelled() {
                    return (resolution, None);
                }
                self.announce(&resolution, uri_1_ref, uri_2_ref);
                let result = self.apply(&resolution).await;
                (resolution, Some(result))
            }
        }))
        .buffer_unordered(self.config.max_concurrent_transfers.max(1));

        // A failing manifest flush must not tear down in-flight
        // transfers or skip the progress finish; record the first
        // error, stop issuing new work, and keep draining.
        let mut flush_error: Option<SyncError> = None;

        while let Some((resolution, result)) = transfers.next().await {
            let result = match result {
                Some(result) => result,
                // Shed by cancellation before it started.
                None => continue,
            };
            match result {
                Ok(written) => {
                    match resolution.action {
                        ResolutionAction::Create => summary.created += 1,
                        ResolutionAction::Update => summary.updated += 1,
                        ResolutionAction::Delete => summary.deleted += 1,
                        ResolutionAction::Skip => {}
                    }
                    let moved = resolution.transfer_size();
                    if moved > 0 {
                        summary.bytes_transferred += moved;
                        self.progress.update(moved);
                    }
                    self.advance_manifest(&mut manifest, &resolution, written);
                    if flush_error.is_none() {
                        if let Err(err) = manifest.flush().await {
                            warn!(
                                error = %err,
                                "manifest flush failed, draining in-flight transfers"
                            );
                            self.cancellation.cancel();
                            flush_error = Some(err);
                        }
                    }
                }
                Err(err) => {
                    let target_uri = resolution
                        .target
                        .map(|side| self.client(side).uri())
                        .unwrap_or_default();
                    warn!(
                        key = %resolution.key,
                        target = %target_uri,
                        error = %err,
                        "operation failed, leaving key for next run"
                    );
                    summary.failed.push(KeyFailure {
                        key: resolution.key,
                        target_uri,
                        message: err.to_string(),
                    });
                }
            }
        }
        drop(transfers);

        if flush_error.is_none() {
            if let Err(err) = manifest.flush().await {
                flush_error = Some(err);
            }
        }
        self.progress.finish();

        if let Some(err) = flush_error {
            return Err(err);
        }
        if self.cancellation.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            skipped_conflicts = summary.skipped_conflicts,
            converged = summary.converged,
            bytes = summary.bytes_transferred,
            failed = summary.failed.len(),
            "sync pass complete"
        );
        Ok(summary)
    }

    fn announce(&self, resolution: &Resolution, uri_1: &str, uri_2: &str) {
        let prefix = if self.config.dry_run { "(dry run) " } else { "" };
        let (source_uri, target_uri) = match (resolution.source, resolution.target) {
            (Some(Side::One), _) => (uri_1, uri_2),
            (Some(Side::Two), _) => (uri_2, uri_1),
            (None, Some(Side::One)) => (uri_2, uri_1),
            _ => (uri_1, uri_2),
        };
        match resolution.action {
            ResolutionAction::Create => {
                info!("{}Creating {} ({} => {})", prefix, resolution.key, source_uri, target_uri);
            }
            ResolutionAction::Update => {
                info!("{}Updating {} ({} => {})", prefix, resolution.key, source_uri, target_uri);
            }
            ResolutionAction::Delete => {
                info!("{}Deleting {} on {}", prefix, resolution.key, target_uri);
            }
            ResolutionAction::Skip => {}
        }
    }

    /// Execute one resolution, retrying transient failures. Returns
    /// the target-side fingerprint for copies, `None` for deletes.
    async fn apply(&self, resolution: &Resolution) -> Result<Option<Fingerprint>> {
        let mut attempt = 0;
        loop {
            let result = self.apply_once(resolution).await;
            match result {
                Ok(written) => return Ok(written),
                Err(err) => {
                    let transient = matches!(&err, SyncError::Store(store) if store.is_transient());
                    if !transient || attempt >= self.config.transfer_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                    debug!(
                        key = %resolution.key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn apply_once(&self, resolution: &Resolution) -> Result<Option<Fingerprint>> {
        match resolution.action {
            ResolutionAction::Create | ResolutionAction::Update => {
                let source = resolution.source.ok_or_else(|| SyncError::ResolverFailed {
                    key: resolution.key.clone(),
                    message: "copy resolution without a source side".into(),
                })?;
                let target = source.other();
                let size = resolution.transfer_size();

                // A fresh stream per attempt; a failed write may have
                // consumed part of the previous one.
                let reader = self.client(source).open_read(&resolution.key).await?;
                let written = self
                    .client(target)
                    .write(&resolution.key, reader, size)
                    .await?;
                Ok(Some(written))
            }
            ResolutionAction::Delete => {
                let target = resolution.target.ok_or_else(|| SyncError::ResolverFailed {
                    key: resolution.key.clone(),
                    message: "delete resolution without a target side".into(),
                })?;
                self.client(target).delete(&resolution.key).await?;
                Ok(None)
            }
            ResolutionAction::Skip => Ok(None),
        }
    }

    /// Record a completed operation in the manifest.
    fn advance_manifest(
        &self,
        manifest: &mut SyncManifest,
        resolution: &Resolution,
        written: Option<Fingerprint>,
    ) {
        match resolution.action {
            ResolutionAction::Create | ResolutionAction::Update => {
                let (source_fp, written_fp) = match (&resolution.fingerprint, written) {
                    (Some(source_fp), Some(written_fp)) => (source_fp.clone(), written_fp),
                    _ => return,
                };
                let entry = match resolution.source {
                    Some(Side::One) => ManifestEntry::new(source_fp, written_fp),
                    Some(Side::Two) => ManifestEntry::new(written_fp, source_fp),
                    None => return,
                };
                manifest.put(&resolution.key, entry);
            }
            ResolutionAction::Delete => manifest.remove(&resolution.key),
            ResolutionAction::Skip => {}
        }
    }
}
