//! Counters for observation lifecycles
//!
//! One [`SyncMetrics`] is shared by every observation created from the same
//! service, so the snapshot describes the whole engine.
//!
//! ## Usage
//!
//! ```ignore
//! let service = ObservationService::new(config);
//! // ... observe accounts ...
//! let snapshot = service.metrics().snapshot();
//! println!("pushes accepted: {}", snapshot.pushes_accepted);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crate::application::Disposition;

/// Metrics collector for observations
///
/// Thread-safe counters, updated from driver tasks.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Observations created
    pub observations_started: AtomicU64,
    /// Observations stopped or dropped
    pub observations_stopped: AtomicU64,
    /// Baseline reads issued
    pub fetches_started: AtomicU64,
    /// Baselines read and decoded
    pub fetches_succeeded: AtomicU64,
    /// Baseline reads or decodes that failed
    pub fetches_failed: AtomicU64,
    /// Baseline reads superseded before completing
    pub fetches_canceled: AtomicU64,
    /// Push subscriptions opened
    pub subscriptions_opened: AtomicU64,
    /// Push subscriptions closed
    pub subscriptions_closed: AtomicU64,
    /// Push updates that replaced the value
    pub pushes_accepted: AtomicU64,
    /// Push updates dropped as stale, duplicate or out of order
    pub pushes_stale: AtomicU64,
    /// Push updates that failed to decode
    pub pushes_rejected: AtomicU64,
    /// Address derivations that failed
    pub derivations_failed: AtomicU64,
}

impl SyncMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation starting
    pub fn record_observation_started(&self) {
        self.observations_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an observation ending
    pub fn record_observation_stopped(&self) {
        self.observations_stopped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a baseline read being issued
    pub fn record_fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a baseline read
    pub fn record_fetch_outcome(&self, succeeded: bool) {
        if succeeded {
            self.fetches_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fetches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a baseline read being canceled
    pub fn record_fetch_canceled(&self) {
        self.fetches_canceled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a subscription being opened
    pub fn record_subscription_opened(&self) {
        self.subscriptions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a subscription being closed
    pub fn record_subscription_closed(&self) {
        self.subscriptions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how a push update was handled
    pub fn record_push(&self, disposition: Disposition) {
        let counter = match disposition {
            Disposition::Applied => &self.pushes_accepted,
            Disposition::Rejected => &self.pushes_rejected,
            Disposition::Stale | Disposition::Ignored => &self.pushes_stale,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed derivation
    pub fn record_derivation_failed(&self) {
        self.derivations_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Subscriptions currently open across all observations
    pub fn open_subscriptions(&self) -> u64 {
        let opened = self.subscriptions_opened.load(Ordering::Relaxed);
        let closed = self.subscriptions_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            observations_started: self.observations_started.load(Ordering::Relaxed),
            observations_stopped: self.observations_stopped.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_succeeded: self.fetches_succeeded.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            fetches_canceled: self.fetches_canceled.load(Ordering::Relaxed),
            subscriptions_opened: self.subscriptions_opened.load(Ordering::Relaxed),
            subscriptions_closed: self.subscriptions_closed.load(Ordering::Relaxed),
            pushes_accepted: self.pushes_accepted.load(Ordering::Relaxed),
            pushes_stale: self.pushes_stale.load(Ordering::Relaxed),
            pushes_rejected: self.pushes_rejected.load(Ordering::Relaxed),
            derivations_failed: self.derivations_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub observations_started: u64,
    pub observations_stopped: u64,
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub fetches_canceled: u64,
    pub subscriptions_opened: u64,
    pub subscriptions_closed: u64,
    pub pushes_accepted: u64,
    pub pushes_stale: u64,
    pub pushes_rejected: u64,
    pub derivations_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let snapshot = SyncMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_record_fetches() {
        let metrics = SyncMetrics::new();
        metrics.record_fetch_started();
        metrics.record_fetch_started();
        metrics.record_fetch_outcome(true);
        metrics.record_fetch_canceled();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fetches_started, 2);
        assert_eq!(snapshot.fetches_succeeded, 1);
        assert_eq!(snapshot.fetches_failed, 0);
        assert_eq!(snapshot.fetches_canceled, 1);
    }

    #[test]
    fn test_record_push_dispositions() {
        let metrics = SyncMetrics::new();
        metrics.record_push(Disposition::Applied);
        metrics.record_push(Disposition::Stale);
        metrics.record_push(Disposition::Rejected);
        metrics.record_push(Disposition::Applied);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pushes_accepted, 2);
        assert_eq!(snapshot.pushes_stale, 1);
        assert_eq!(snapshot.pushes_rejected, 1);
    }

    #[test]
    fn test_open_subscriptions() {
        let metrics = SyncMetrics::new();
        metrics.record_subscription_opened();
        metrics.record_subscription_opened();
        metrics.record_subscription_closed();
        assert_eq!(metrics.open_subscriptions(), 1);
    }
}
