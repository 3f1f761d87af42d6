//! Transfer progress accounting
//!
//! The worker announces the total byte volume once, then reports each
//! completed transfer. Implementations must tolerate `update` calls
//! from multiple transfer tasks at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Sink for transfer progress events.
pub trait ProgressReporter: Send + Sync {
    /// Called once per run, before any transfer starts, with the total
    /// bytes the run intends to move. Deletes and skips contribute
    /// zero.
    fn start(&self, total_bytes: u64);

    /// Called after each completed copy with the bytes it moved.
    fn update(&self, delta_bytes: u64);

    /// Called exactly once when the run ends, including on
    /// cancellation and failure.
    fn finish(&self);
}

/// Discards all progress events.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn start(&self, _total_bytes: u64) {}
    fn update(&self, _delta_bytes: u64) {}
    fn finish(&self) {}
}

/// Accumulates progress into atomics, for embedders that poll and for
/// tests.
#[derive(Default)]
pub struct CountingReporter {
    total: AtomicU64,
    transferred: AtomicU64,
    finished: AtomicBool,
}

impl CountingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ProgressReporter for CountingReporter {
    fn start(&self, total_bytes: u64) {
        self.total.store(total_bytes, Ordering::SeqCst);
    }

    fn update(&self, delta_bytes: u64) {
        self.transferred.fetch_add(delta_bytes, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_reporter_accumulates_updates() {
        let reporter = CountingReporter::new();
        reporter.start(100);
        reporter.update(30);
        reporter.update(20);
        assert_eq!(reporter.total_bytes(), 100);
        assert_eq!(reporter.transferred_bytes(), 50);
        assert!(!reporter.is_finished());

        reporter.finish();
        assert!(reporter.is_finished());
    }
}
