//! Timeout Reader Adapter
//!
//! Bounds the latency of any data source's baseline read. Subscriptions
//! pass straight through.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{Subject, SyncError};
use crate::ports::outbound::{AccountDataSource, ChangeCallback, SubscriptionHandle};

/// Message of the read error raised when the deadline passes.
pub const READ_TIMEOUT: &str = "timeout";

/// Data source wrapper applying a deadline to every read.
pub struct TimeoutReader {
    inner: Arc<dyn AccountDataSource>,
    timeout: Duration,
}

impl TimeoutReader {
    /// Wrap `inner`, failing reads that take longer than `timeout`.
    pub fn new(inner: Arc<dyn AccountDataSource>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Wrap `source` when a deadline is configured, else pass it through.
    pub fn apply(
        source: Arc<dyn AccountDataSource>,
        timeout: Option<Duration>,
    ) -> Arc<dyn AccountDataSource> {
        match timeout {
            Some(timeout) => Arc::new(Self::new(source, timeout)),
            None => source,
        }
    }

    /// Configured deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl AccountDataSource for TimeoutReader {
    async fn read(&self, subject: Subject) -> Result<Vec<u8>, SyncError> {
        match tokio::time::timeout(self.timeout, self.inner.read(subject)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    %subject,
                    source = self.inner.source_id(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "read timed out"
                );
                Err(SyncError::read(READ_TIMEOUT))
            }
        }
    }

    fn subscribe(&self, subject: Subject, on_change: ChangeCallback) -> SubscriptionHandle {
        self.inner.subscribe(subject, on_change)
    }

    fn source_id(&self) -> &str {
        self.inner.source_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryAccountStore;

    struct StalledSource;

    #[async_trait]
    impl AccountDataSource for StalledSource {
        async fn read(&self, _subject: Subject) -> Result<Vec<u8>, SyncError> {
            std::future::pending().await
        }

        fn subscribe(&self, _subject: Subject, _on_change: ChangeCallback) -> SubscriptionHandle {
            SubscriptionHandle::detached()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_read_times_out() {
        let reader = TimeoutReader::new(Arc::new(StalledSource), Duration::from_millis(50));
        let outcome = reader.read(Subject::new_from_array([1u8; 32])).await;
        assert_eq!(outcome, Err(SyncError::read("timeout")));
    }

    #[tokio::test]
    async fn test_fast_read_passes_through() {
        let store = Arc::new(InMemoryAccountStore::new());
        let subject = Subject::new_from_array([1u8; 32]);
        store.set_account(subject, vec![9]);

        let reader = TimeoutReader::new(store.clone(), Duration::from_secs(1));
        assert_eq!(reader.read(subject).await, Ok(vec![9]));
        assert_eq!(reader.source_id(), "in-memory");

        let _handle = reader.subscribe(subject, Arc::new(|_| {}));
        assert_eq!(store.subscriber_count(&subject), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_wraps_only_with_deadline() {
        let raw: Arc<dyn AccountDataSource> = Arc::new(StalledSource);
        let subject = Subject::new_from_array([1u8; 32]);

        let bounded = TimeoutReader::apply(raw.clone(), Some(Duration::from_millis(20)));
        assert_eq!(bounded.read(subject).await, Err(SyncError::read(READ_TIMEOUT)));

        let unbounded = TimeoutReader::apply(raw, None);
        let stalled = tokio::time::timeout(Duration::from_secs(5), unbounded.read(subject)).await;
        assert!(stalled.is_err());
    }
}
