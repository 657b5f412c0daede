//! Crawler progress counters
//!
//! Errors are never surfaced to end users; the operator-visible signal is
//! the chunk rate going flat. These counters are logged at every sweep
//! boundary so a stalled crawler shows up in the logs with its failure
//! breakdown.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters for one crawler engine
#[derive(Debug, Default)]
pub struct CrawlerMetrics {
    chunks_processed: AtomicU64,
    accounts_seen: AtomicU64,
    sweeps_completed: AtomicU64,
    sweeps_restarted: AtomicU64,
    lease_lost: AtomicU64,
    listener_failures: AtomicU64,
    transient_errors: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub chunks_processed: u64,
    pub accounts_seen: u64,
    pub sweeps_completed: u64,
    pub sweeps_restarted: u64,
    pub lease_lost: u64,
    pub listener_failures: u64,
    pub transient_errors: u64,
}

impl CrawlerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk(&self, accounts: usize) {
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
        self.accounts_seen
            .fetch_add(accounts as u64, Ordering::Relaxed);
    }

    pub fn record_sweep_completed(&self) {
        self.sweeps_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep_restarted(&self) {
        self.sweeps_restarted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lease_lost(&self) {
        self.lease_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listener_failure(&self) {
        self.listener_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            accounts_seen: self.accounts_seen.load(Ordering::Relaxed),
            sweeps_completed: self.sweeps_completed.load(Ordering::Relaxed),
            sweeps_restarted: self.sweeps_restarted.load(Ordering::Relaxed),
            lease_lost: self.lease_lost.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = CrawlerMetrics::new();

        metrics.record_chunk(10);
        metrics.record_chunk(5);
        metrics.record_sweep_completed();
        metrics.record_listener_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.chunks_processed, 2);
        assert_eq!(snapshot.accounts_seen, 15);
        assert_eq!(snapshot.sweeps_completed, 1);
        assert_eq!(snapshot.listener_failures, 1);
        assert_eq!(snapshot.lease_lost, 0);
    }
}
