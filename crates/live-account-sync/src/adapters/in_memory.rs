//! In-Memory Account Store Adapter
//!
//! Implements `AccountDataSource` over a process-local map. Every write
//! advances a slot counter and notifies subscribers of the written account,
//! which makes the store a stand-in for a node during tests and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{AccountUpdate, Subject, SyncError};
use crate::ports::outbound::{AccountDataSource, ChangeCallback, SubscriptionHandle};

/// Message reported when reading an account that does not exist.
pub const ACCOUNT_NOT_FOUND: &str = "Failed to find account";

type Subscribers = HashMap<Subject, Vec<(u64, ChangeCallback)>>;

#[derive(Default)]
struct StoreState {
    accounts: HashMap<Subject, Vec<u8>>,
    read_failure: Option<String>,
}

/// Shared in-process data source.
#[derive(Default)]
pub struct InMemoryAccountStore {
    state: RwLock<StoreState>,
    subscribers: Arc<RwLock<Subscribers>>,
    slot: AtomicU64,
    next_subscriber_id: AtomicU64,
    reads: AtomicUsize,
}

impl InMemoryAccountStore {
    /// Create an empty store at slot 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current slot.
    pub fn slot(&self) -> u64 {
        self.slot.load(Ordering::SeqCst)
    }

    /// Write `data` at the next slot and notify subscribers.
    ///
    /// Returns the slot of the write.
    pub fn set_account(&self, subject: Subject, data: Vec<u8>) -> u64 {
        let slot = self.slot.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().accounts.insert(subject, data.clone());
        self.notify(subject, AccountUpdate::new(data, slot));
        slot
    }

    /// Remove an account. Subscribers are not notified.
    pub fn remove_account(&self, subject: &Subject) -> bool {
        self.state.write().accounts.remove(subject).is_some()
    }

    /// Deliver a raw update with an explicit slot without storing it.
    ///
    /// Used to simulate duplicate or out-of-order notifications.
    pub fn push_raw(&self, subject: Subject, data: Vec<u8>, slot: u64) {
        self.notify(subject, AccountUpdate::new(data, slot));
    }

    /// Make every read fail with `message` until [`Self::clear_failure`].
    pub fn fail_reads(&self, message: impl Into<String>) {
        self.state.write().read_failure = Some(message.into());
    }

    /// Stop injecting read failures.
    pub fn clear_failure(&self) {
        self.state.write().read_failure = None;
    }

    /// Open subscriptions for `subject`.
    pub fn subscriber_count(&self, subject: &Subject) -> usize {
        self.subscribers.read().get(subject).map_or(0, Vec::len)
    }

    /// Open subscriptions across all subjects.
    pub fn total_subscribers(&self) -> usize {
        self.subscribers.read().values().map(Vec::len).sum()
    }

    /// Reads served so far, failed ones included.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn notify(&self, subject: Subject, update: AccountUpdate) {
        // Collect first so callbacks run without the lock held.
        let callbacks: Vec<ChangeCallback> = self
            .subscribers
            .read()
            .get(&subject)
            .map(|subs| subs.iter().map(|(_, callback)| callback.clone()).collect())
            .unwrap_or_default();

        debug!(
            %subject,
            slot = update.marker.slot(),
            subscribers = callbacks.len(),
            "notifying subscribers"
        );
        for callback in callbacks {
            callback(update.clone());
        }
    }
}

#[async_trait]
impl AccountDataSource for InMemoryAccountStore {
    async fn read(&self, subject: Subject) -> Result<Vec<u8>, SyncError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read();
        if let Some(message) = &state.read_failure {
            return Err(SyncError::read(message));
        }
        state
            .accounts
            .get(&subject)
            .cloned()
            .ok_or_else(|| SyncError::read(ACCOUNT_NOT_FOUND))
    }

    fn subscribe(&self, subject: Subject, on_change: ChangeCallback) -> SubscriptionHandle {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .write()
            .entry(subject)
            .or_default()
            .push((id, on_change));

        let subscribers = self.subscribers.clone();
        SubscriptionHandle::new(move || {
            let mut subscribers = subscribers.write();
            if let Some(subs) = subscribers.get_mut(&subject) {
                subs.retain(|(existing, _)| *existing != id);
                if subs.is_empty() {
                    subscribers.remove(&subject);
                }
            }
        })
    }

    fn source_id(&self) -> &str {
        "in-memory"
    }
}

impl std::fmt::Debug for InMemoryAccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAccountStore")
            .field("slot", &self.slot())
            .field("accounts", &self.state.read().accounts.len())
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}
