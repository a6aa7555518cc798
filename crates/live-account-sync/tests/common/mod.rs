//! Shared fixtures for integration tests.
//!
//! [`GatedSource`] parks every read until the test releases it, which makes
//! "subject changed mid-fetch" deterministic. Subscriptions and pushes go
//! through an [`InMemoryAccountStore`].

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use live_account_sync::{
    encode_account, encode_mint, AccountDataSource, AccountState, AddressDeriver, ChangeCallback,
    InMemoryAccountStore, MintState, Subject, SubscriptionHandle, SyncError,
};

// =============================================================================
// TEST HELPERS
// =============================================================================

pub const WAIT: Duration = Duration::from_secs(2);

pub fn subject(byte: u8) -> Subject {
    Subject::new_from_array([byte; 32])
}

pub fn account(address: Subject, amount: u64) -> AccountState {
    AccountState {
        address,
        mint: subject(0xAA),
        owner: subject(0xBB),
        amount,
        delegate: None,
        delegated_amount: 0,
        is_initialized: true,
        is_frozen: false,
        is_native: false,
        rent_exempt_reserve: None,
        close_authority: None,
    }
}

pub fn account_bytes(address: Subject, amount: u64) -> Vec<u8> {
    encode_account(&account(address, amount))
}

pub fn mint_bytes(supply: u64, decimals: u8) -> Vec<u8> {
    encode_mint(&MintState {
        mint_authority: Some(subject(0xCC)),
        supply,
        decimals,
        is_initialized: true,
        freeze_authority: None,
    })
}

pub fn source<S: AccountDataSource + 'static>(source: &Arc<S>) -> Option<Arc<dyn AccountDataSource>> {
    let source: Arc<dyn AccountDataSource> = source.clone();
    Some(source)
}

/// Bound a future so a broken test fails instead of hanging.
pub async fn within<F: Future>(future: F) -> F::Output {
    match tokio::time::timeout(WAIT, future).await {
        Ok(output) => output,
        Err(_) => panic!("timed out after {WAIT:?}"),
    }
}

/// Poll `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
}

// =============================================================================
// GATED SOURCE
// =============================================================================

type Gate = oneshot::Sender<Result<Vec<u8>, SyncError>>;

/// Data source whose reads complete only when released.
#[derive(Default)]
pub struct GatedSource {
    pub store: InMemoryAccountStore,
    gates: Mutex<HashMap<Subject, VecDeque<Gate>>>,
    reads: Mutex<Vec<Subject>>,
}

impl GatedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subjects read so far, in order.
    pub fn reads(&self) -> Vec<Subject> {
        self.reads.lock().clone()
    }

    /// Reads of `subject` still parked.
    pub fn pending(&self, subject: &Subject) -> usize {
        self.gates.lock().get(subject).map_or(0, VecDeque::len)
    }

    /// Wait until a read of `subject` is parked.
    pub async fn wait_for_read(&self, subject: Subject) {
        eventually(|| self.pending(&subject) > 0).await;
    }

    /// Wait until the oldest parked read of `subject` was dropped by its caller.
    pub async fn wait_abandoned(&self, subject: Subject) {
        eventually(|| {
            self.gates
                .lock()
                .get(&subject)
                .and_then(|gates| gates.front())
                .is_some_and(|gate| gate.is_closed())
        })
        .await;
    }

    /// Complete the oldest parked read of `subject`.
    ///
    /// Returns `false` if no read was parked or its caller already gave up.
    pub fn release(&self, subject: Subject, outcome: Result<Vec<u8>, SyncError>) -> bool {
        let gate = self
            .gates
            .lock()
            .get_mut(&subject)
            .and_then(VecDeque::pop_front);
        match gate {
            Some(gate) => gate.send(outcome).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl AccountDataSource for GatedSource {
    async fn read(&self, subject: Subject) -> Result<Vec<u8>, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.reads.lock().push(subject);
        self.gates.lock().entry(subject).or_default().push_back(tx);
        rx.await
            .unwrap_or_else(|_| Err(SyncError::read("gate dropped")))
    }

    fn subscribe(&self, subject: Subject, on_change: ChangeCallback) -> SubscriptionHandle {
        self.store.subscribe(subject, on_change)
    }

    fn source_id(&self) -> &str {
        "gated"
    }
}

// =============================================================================
// GATED DERIVER
// =============================================================================

type DeriveGate = oneshot::Sender<Result<Subject, SyncError>>;

/// Address deriver whose lookups complete only when released.
#[derive(Default)]
pub struct GatedDeriver {
    gates: Mutex<VecDeque<((Subject, Subject, bool), DeriveGate)>>,
}

impl GatedDeriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lookups still parked.
    pub fn pending(&self) -> usize {
        self.gates.lock().len()
    }

    /// Arguments of the newest parked lookup.
    pub fn last_request(&self) -> Option<(Subject, Subject, bool)> {
        self.gates.lock().back().map(|(request, _)| *request)
    }

    /// Wait until `count` lookups are parked.
    pub async fn wait_for_pending(&self, count: usize) {
        eventually(|| self.pending() >= count).await;
    }

    /// Complete the oldest parked lookup. Returns `false` if its caller gave up.
    pub fn release(&self, outcome: Result<Subject, SyncError>) -> bool {
        let gate = self.gates.lock().pop_front();
        match gate {
            Some((_, gate)) => gate.send(outcome).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl AddressDeriver for GatedDeriver {
    async fn derive(
        &self,
        base: Subject,
        owner: Subject,
        allow_off_curve: bool,
    ) -> Result<Subject, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .push_back(((base, owner, allow_off_curve), tx));
        rx.await
            .unwrap_or_else(|_| Err(SyncError::derivation("gate dropped")))
    }
}
