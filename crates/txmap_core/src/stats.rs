//! Overlay lifecycle counters.
//!
//! All counters are atomic and monotonically increasing, so they can be read
//! while transactions are in progress on other threads.

use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction lifecycle counters for one overlay.
#[derive(Debug, Default)]
pub struct OverlayStats {
    started: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    suspended: AtomicU64,
    resumed: AtomicU64,
    commit_failures: AtomicU64,
    abandoned: AtomicU64,
}

impl OverlayStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suspend(&self) {
        self.suspended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resume(&self) {
        self.resumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandon(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            suspended: self.suspended.load(Ordering::Relaxed),
            resumed: self.resumed.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`OverlayStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Transactions started.
    pub started: u64,
    /// Transactions committed successfully.
    pub committed: u64,
    /// Transactions rolled back.
    pub rolled_back: u64,
    /// Suspensions performed.
    pub suspended: u64,
    /// Resumptions performed.
    pub resumed: u64,
    /// Commits that failed in the backing map.
    pub commit_failures: u64,
    /// Transactions rolled back because their thread exited.
    pub abandoned: u64,
}

impl StatsSnapshot {
    /// Transactions started but not yet ended.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.started.saturating_sub(
            self.committed + self.rolled_back + self.commit_failures + self.abandoned,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = OverlayStats::new();
        stats.record_start();
        stats.record_start();
        stats.record_suspend();
        stats.record_resume();
        stats.record_commit();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.started, 2);
        assert_eq!(snapshot.committed, 1);
        assert_eq!(snapshot.suspended, 1);
        assert_eq!(snapshot.resumed, 1);
        assert_eq!(snapshot.in_flight(), 1);
    }

    #[test]
    fn failed_commit_ends_transaction() {
        let stats = OverlayStats::new();
        stats.record_start();
        stats.record_commit_failure();
        assert_eq!(stats.snapshot().in_flight(), 0);
    }

    #[test]
    fn abandoned_transaction_is_not_in_flight() {
        let stats = OverlayStats::new();
        stats.record_start();
        stats.record_abandon();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.abandoned, 1);
        assert_eq!(snapshot.rolled_back, 0);
        assert_eq!(snapshot.in_flight(), 0);
    }
}
