//! End-to-end worker tests over in-memory store pairs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use core_sync::{
    Action, ConflictChoice, ConflictResolver, CountingReporter, PreferSide, Side, SyncConfig,
    SyncError, SyncManifest, SyncWorker,
};
use store_traits::MemoryStore;
use tempfile::TempDir;

struct Pair {
    a: Arc<MemoryStore>,
    b: Arc<MemoryStore>,
    state: TempDir,
}

impl Pair {
    fn new() -> Self {
        // RUST_LOG=debug surfaces worker logs when a test misbehaves.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        Self {
            a: Arc::new(MemoryStore::new("mem://a")),
            b: Arc::new(MemoryStore::new("mem://b")),
            state: tempfile::tempdir().unwrap(),
        }
    }

    fn worker(&self) -> SyncWorker {
        SyncWorker::new(self.a.clone(), self.b.clone(), self.state.path())
    }

    async fn manifest(&self) -> SyncManifest {
        let path = SyncManifest::store_path(self.state.path(), "mem://a", "mem://b");
        SyncManifest::load(path).await.unwrap()
    }
}

/// Delegates to a fixed choice and counts invocations.
struct CountingResolver {
    choice: ConflictChoice,
    calls: AtomicUsize,
}

impl CountingResolver {
    fn new(choice: ConflictChoice) -> Self {
        Self {
            choice,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ConflictResolver for CountingResolver {
    async fn resolve(
        &self,
        _key: &str,
        _action_1: &Action,
        _uri_1: &str,
        _action_2: &Action,
        _uri_2: &str,
    ) -> core_sync::Result<ConflictChoice> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.choice)
    }
}

#[tokio::test]
async fn one_sided_create_copies_and_second_run_is_idempotent() {
    let pair = Pair::new();
    pair.a.seed("docs/readme.md", b"hello");

    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.bytes_transferred, 5);
    assert!(summary.is_clean());
    assert_eq!(pair.b.contents("docs/readme.md").unwrap().as_ref(), b"hello");

    let again = pair.worker().sync().await.unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.updated, 0);
    assert_eq!(again.deleted, 0);
    assert_eq!(again.bytes_transferred, 0);
}

#[tokio::test]
async fn crossed_creates_copy_in_both_directions() {
    let pair = Pair::new();
    pair.a.seed("a.txt", b"from a");
    pair.b.seed("b.txt", b"from b");

    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(pair.a.contents("b.txt").unwrap().as_ref(), b"from b");
    assert_eq!(pair.b.contents("a.txt").unwrap().as_ref(), b"from a");

    let manifest = pair.manifest().await;
    assert_eq!(manifest.len(), 2);
}

#[tokio::test]
async fn one_sided_edit_propagates_as_update() {
    let pair = Pair::new();
    pair.a.seed("c.txt", b"v1");
    pair.worker().sync().await.unwrap();

    pair.a.seed("c.txt", b"version two");
    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(pair.b.contents("c.txt").unwrap().as_ref(), b"version two");
}

#[tokio::test]
async fn deletion_propagates_onto_unchanged_side() {
    let pair = Pair::new();
    pair.a.seed("gone.txt", b"data");
    pair.worker().sync().await.unwrap();

    use store_traits::StoreClient;
    pair.a.delete("gone.txt").await.unwrap();

    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.deleted, 1);
    assert!(pair.b.contents("gone.txt").is_none());
    assert!(pair.manifest().await.is_empty());
}

#[tokio::test]
async fn deletion_on_both_sides_only_forgets_the_entry() {
    let pair = Pair::new();
    pair.a.seed("both.txt", b"data");
    pair.worker().sync().await.unwrap();
    assert_eq!(pair.manifest().await.len(), 1);

    use store_traits::StoreClient;
    pair.a.delete("both.txt").await.unwrap();
    pair.b.delete("both.txt").await.unwrap();

    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.deleted, 0);
    assert!(summary.is_clean());
    assert!(pair.manifest().await.is_empty());
}

#[tokio::test]
async fn convergent_edits_record_without_transferring() {
    let pair = Pair::new();
    pair.a.seed("same.txt", b"identical bytes");
    pair.b.seed("same.txt", b"identical bytes");

    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.converged, 1);
    assert_eq!(summary.bytes_transferred, 0);
    assert_eq!(pair.manifest().await.len(), 1);

    let again = pair.worker().sync().await.unwrap();
    assert_eq!(again.converged, 0);
}

#[tokio::test]
async fn conflicting_creates_are_skipped_by_default_and_resurface() {
    let pair = Pair::new();
    pair.a.seed("d.txt", b"side a");
    pair.b.seed("d.txt", b"side b");

    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.skipped_conflicts, 1);
    assert_eq!(pair.a.contents("d.txt").unwrap().as_ref(), b"side a");
    assert_eq!(pair.b.contents("d.txt").unwrap().as_ref(), b"side b");
    assert!(pair.manifest().await.is_empty());

    let again = pair.worker().sync().await.unwrap();
    assert_eq!(again.skipped_conflicts, 1);
}

#[tokio::test]
async fn prefer_side_resolves_conflict_and_resolver_runs_once() {
    let pair = Pair::new();
    pair.a.seed("d.txt", b"side a wins");
    pair.b.seed("d.txt", b"side b");

    let resolver = Arc::new(CountingResolver::new(ConflictChoice::KeepSide(Side::One)));
    let worker = pair.worker().with_resolver(resolver.clone());

    let summary = worker.sync().await.unwrap();
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(summary.skipped_conflicts, 0);
    assert_eq!(summary.created, 1);
    assert_eq!(pair.b.contents("d.txt").unwrap().as_ref(), b"side a wins");

    // Resolved for good: nothing resurfaces.
    let again = pair.worker().sync().await.unwrap();
    assert_eq!(again.skipped_conflicts, 0);
    assert_eq!(again.created + again.updated, 0);
}

#[tokio::test]
async fn prefer_side_two_pushes_the_other_way() {
    let pair = Pair::new();
    pair.a.seed("d.txt", b"old");
    pair.worker().sync().await.unwrap();

    pair.a.seed("d.txt", b"edit a");
    pair.b.seed("d.txt", b"edit b");

    let worker = pair.worker().with_resolver(Arc::new(PreferSide(Side::Two)));
    let summary = worker.sync().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(pair.a.contents("d.txt").unwrap().as_ref(), b"edit b");
}

#[tokio::test]
async fn dry_run_reports_without_mutating_anything() {
    let pair = Pair::new();
    pair.a.seed("new.txt", b"payload");

    let config = SyncConfig {
        dry_run: true,
        ..SyncConfig::default()
    };
    let summary = pair.worker().with_config(config).sync().await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.bytes_transferred, 0);
    assert!(pair.b.is_empty());
    assert!(pair.manifest().await.is_empty());

    // The live run afterwards still sees the work.
    let live = pair.worker().sync().await.unwrap();
    assert_eq!(live.created, 1);
    assert_eq!(pair.b.contents("new.txt").unwrap().as_ref(), b"payload");
}

#[tokio::test]
async fn one_failing_key_does_not_block_the_rest() {
    let pair = Pair::new();
    pair.a.seed("good.txt", b"fine");
    pair.a.seed("bad.txt", b"doomed");
    pair.b.fail_writes_on("bad.txt");

    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].key, "bad.txt");
    assert_eq!(summary.failed[0].target_uri, "mem://b");
    assert_eq!(pair.b.contents("good.txt").unwrap().as_ref(), b"fine");

    // Only the completed key advanced the manifest.
    let manifest = pair.manifest().await;
    assert_eq!(manifest.len(), 1);
    assert!(manifest.get("good.txt").is_some());
}

#[tokio::test]
async fn failed_update_keeps_the_prior_manifest_entry() {
    let pair = Pair::new();
    pair.a.seed("k.txt", b"v1");
    pair.worker().sync().await.unwrap();

    let before = pair.manifest().await;
    let entry = before.get("k.txt").unwrap();
    let (hash_1, hash_2) = (
        entry.fingerprint_1.content_hash.clone(),
        entry.fingerprint_2.content_hash.clone(),
    );

    pair.a.seed("k.txt", b"v2");
    pair.b.fail_writes_on("k.txt");

    let summary = pair.worker().sync().await.unwrap();
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].key, "k.txt");

    // The stale entry survives untouched, so the next pass re-detects
    // the same one-sided edit.
    let after = pair.manifest().await;
    let entry = after.get("k.txt").unwrap();
    assert_eq!(entry.fingerprint_1.content_hash, hash_1);
    assert_eq!(entry.fingerprint_2.content_hash, hash_2);
    assert_eq!(pair.b.contents("k.txt").unwrap().as_ref(), b"v1");
}

#[tokio::test]
async fn manifest_flush_failure_still_finishes_progress() {
    let pair = Pair::new();
    pair.a.seed("x.txt", b"data");

    // Occupying the manifest's temp path with a directory makes every
    // flush fail while the initial load still starts empty.
    let path = SyncManifest::store_path(pair.state.path(), "mem://a", "mem://b");
    tokio::fs::create_dir_all(path.with_extension("json.tmp"))
        .await
        .unwrap();

    let reporter = Arc::new(CountingReporter::new());
    let err = pair
        .worker()
        .with_progress(reporter.clone())
        .sync()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ManifestIo { .. }));
    assert!(reporter.is_finished());
    // The transfer itself completed before the flush failed.
    assert_eq!(pair.b.contents("x.txt").unwrap().as_ref(), b"data");
}

#[tokio::test]
async fn resolver_failure_names_both_sides() {
    struct FailingResolver;

    #[async_trait]
    impl ConflictResolver for FailingResolver {
        async fn resolve(
            &self,
            key: &str,
            _action_1: &Action,
            _uri_1: &str,
            _action_2: &Action,
            _uri_2: &str,
        ) -> core_sync::Result<ConflictChoice> {
            Err(SyncError::ResolverFailed {
                key: key.to_string(),
                message: "no decision".to_string(),
            })
        }
    }

    let pair = Pair::new();
    pair.a.seed("d.txt", b"side a");
    pair.b.seed("d.txt", b"side b");

    let worker = pair.worker().with_resolver(Arc::new(FailingResolver));
    let summary = worker.sync().await.unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].key, "d.txt");
    assert!(summary.failed[0].target_uri.contains("mem://a"));
    assert!(summary.failed[0].target_uri.contains("mem://b"));
}

#[tokio::test]
async fn corrupt_manifest_aborts_the_run() {
    let pair = Pair::new();
    let path = SyncManifest::store_path(pair.state.path(), "mem://a", "mem://b");
    tokio::fs::write(&path, b"not a manifest").await.unwrap();

    pair.a.seed("x.txt", b"data");
    let err = pair.worker().sync().await.unwrap_err();
    assert!(matches!(err, SyncError::ManifestCorruption { .. }));
    assert!(pair.b.is_empty());
}

#[tokio::test]
async fn progress_reports_exact_byte_totals() {
    let pair = Pair::new();
    pair.a.seed("one.bin", b"abc");
    pair.a.seed("two.bin", b"abcde");

    let reporter = Arc::new(CountingReporter::new());
    let summary = pair
        .worker()
        .with_progress(reporter.clone())
        .sync()
        .await
        .unwrap();

    assert_eq!(reporter.total_bytes(), 8);
    assert_eq!(reporter.transferred_bytes(), 8);
    assert!(reporter.is_finished());
    assert_eq!(summary.bytes_transferred, 8);
}

#[tokio::test]
async fn cancelled_token_sheds_work_and_reports_cancellation() {
    let pair = Pair::new();
    pair.a.seed("late.txt", b"never copied");

    let worker = pair.worker();
    worker.cancellation_token().cancel();

    let err = worker.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::Cancelled));
    assert!(pair.b.is_empty());
    assert!(pair.manifest().await.is_empty());
}
