//! # Live Update Tests
//!
//! Push subscription behavior end to end: slot ordering, decode isolation,
//! subscription gating on the baseline, connectivity and teardown.

mod common;

use std::sync::Arc;

use common::*;
use live_account_sync::{
    AccountObserver, InMemoryAccountStore, Observation, ObservationService, RecordKind,
    SequenceMarker, Subject, SyncConfig, SyncError,
};
use proptest::prelude::*;

fn service() -> ObservationService {
    ObservationService::new(SyncConfig::default())
}

/// Live observation of `s` whose baseline (amount 100) has been published.
async fn live_account(
    service: &ObservationService,
    store: &Arc<InMemoryAccountStore>,
    s: Subject,
) -> Observation {
    store.set_account(s, account_bytes(s, 100));
    let mut observation =
        service.observe_with_subscription(RecordKind::AccountState, Some(s), source(store));
    within(observation.wait_for(|state| state.value.is_some())).await;
    observation
}

fn amount(observation: &Observation) -> Option<u64> {
    observation.state().account().map(|a| a.amount)
}

// =============================================================================
// ORDERING
// =============================================================================

#[tokio::test]
async fn out_of_order_push_is_ignored() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let mut observation = live_account(&service, &store, s).await;
    assert_eq!(store.subscriber_count(&s), 1);

    store.push_raw(s, account_bytes(s, 150), 5);
    store.push_raw(s, account_bytes(s, 120), 3);

    within(observation.wait_for(|state| state.last_sequence == Some(SequenceMarker(5)))).await;
    let metrics = service.metrics();
    eventually(|| metrics.snapshot().pushes_stale >= 1).await;

    let state = observation.state();
    assert_eq!(state.account().map(|a| a.amount), Some(150));
    assert_eq!(state.last_sequence, Some(SequenceMarker(5)));
    assert!(state.error.is_none());
}

#[tokio::test]
async fn store_writes_flow_through_subscription() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let mut observation = live_account(&service, &store, s).await;

    let slot = store.set_account(s, account_bytes(s, 101));
    let state = within(observation.wait_for(|state| state.last_sequence.is_some()))
        .await
        .unwrap();
    assert_eq!(state.last_sequence, Some(SequenceMarker(slot)));
    assert_eq!(state.account().map(|a| a.amount), Some(101));
}

#[tokio::test]
async fn duplicate_marker_is_ignored() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let mut observation = live_account(&service, &store, s).await;

    store.push_raw(s, account_bytes(s, 150), 5);
    within(observation.wait_for(|state| state.last_sequence.is_some())).await;
    store.push_raw(s, account_bytes(s, 999), 5);

    let metrics = service.metrics();
    eventually(|| metrics.snapshot().pushes_stale >= 1).await;
    assert_eq!(amount(&observation), Some(150));
}

#[test]
fn monotonic_sequence_holds_for_any_delivery_order() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    proptest!(ProptestConfig::with_cases(24), |(markers in proptest::collection::vec(1u64..50, 1..20))| {
        runtime.block_on(async {
            let store = Arc::new(InMemoryAccountStore::new());
            let s = subject(1);
            let service = service();
            let observation = live_account(&service, &store, s).await;

            for marker in &markers {
                store.push_raw(s, account_bytes(s, marker * 10), *marker);
            }
            let metrics = service.metrics();
            let delivered = markers.len() as u64;
            eventually(|| {
                let snapshot = metrics.snapshot();
                snapshot.pushes_accepted + snapshot.pushes_stale >= delivered
            })
            .await;

            let highest = markers.iter().copied().max();
            let state = observation.state();
            assert_eq!(state.last_sequence, highest.map(SequenceMarker));
            assert_eq!(state.account().map(|a| a.amount), highest.map(|h| h * 10));
        });
    });
}

// =============================================================================
// SUBSCRIPTION GATING
// =============================================================================

#[tokio::test]
async fn no_subscription_before_baseline() {
    let gated = GatedSource::new();
    let s = subject(1);
    let service = service();
    let mut observation =
        service.observe_with_subscription(RecordKind::AccountState, Some(s), source(&gated));

    gated.wait_for_read(s).await;
    assert_eq!(gated.store.subscriber_count(&s), 0);

    // Nobody is listening yet, so this update is never seen.
    gated.store.push_raw(s, account_bytes(s, 999), 50);

    gated.release(s, Ok(account_bytes(s, 100)));
    let state = within(observation.wait_for(|state| !state.loading))
        .await
        .unwrap();
    assert_eq!(state.account().map(|a| a.amount), Some(100));
    assert!(state.last_sequence.is_none());
    assert_eq!(gated.store.subscriber_count(&s), 1);
}

#[tokio::test]
async fn fetch_only_observation_never_subscribes() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    store.set_account(s, account_bytes(s, 100));
    let service = service();
    let mut observation = service.observe(RecordKind::AccountState, Some(s), source(&store));
    within(observation.wait_for(|state| state.value.is_some())).await;

    assert_eq!(store.subscriber_count(&s), 0);
    store.set_account(s, account_bytes(s, 200));
    assert_eq!(amount(&observation), Some(100));
}

#[tokio::test]
async fn content_changes_do_not_resubscribe() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let mut observation = live_account(&service, &store, s).await;

    for amount in 1..=5 {
        store.set_account(s, account_bytes(s, amount));
    }
    within(observation.wait_for(|state| {
        state.account().is_some_and(|a| a.amount == 5)
    }))
    .await;

    assert_eq!(store.subscriber_count(&s), 1);
    assert_eq!(service.metrics().snapshot().subscriptions_opened, 1);
}

// =============================================================================
// DECODE ISOLATION
// =============================================================================

#[tokio::test]
async fn push_decode_failure_keeps_value_and_sequence() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let mut observation = live_account(&service, &store, s).await;

    store.push_raw(s, account_bytes(s, 140), 4);
    within(observation.wait_for(|state| state.last_sequence.is_some())).await;

    store.push_raw(s, vec![1, 2, 3], 9);
    let state = within(observation.wait_for(|state| state.error.is_some()))
        .await
        .unwrap();

    assert_eq!(state.account().map(|a| a.amount), Some(140));
    assert_eq!(state.last_sequence, Some(SequenceMarker(4)));
    assert!(matches!(state.error, Some(SyncError::SubscriptionDecode(_))));
    assert_eq!(
        state.error.map(|e| e.to_string()),
        Some("Invalid account size: expected 165 bytes, got 3".to_string())
    );
    assert_eq!(service.metrics().snapshot().pushes_rejected, 1);
}

// =============================================================================
// CONNECTIVITY AND TEARDOWN
// =============================================================================

#[tokio::test]
async fn subject_change_closes_old_subscription() {
    let store = Arc::new(InMemoryAccountStore::new());
    let (s, t) = (subject(1), subject(2));
    store.set_account(t, account_bytes(t, 7));
    let service = service();
    let mut observation = live_account(&service, &store, s).await;
    assert_eq!(store.subscriber_count(&s), 1);

    observation.set_subject(Some(t));
    let state = within(observation.wait_for(|state| {
        state.subject == Some(t) && !state.loading
    }))
    .await
    .unwrap();
    assert_eq!(state.account().map(|a| a.amount), Some(7));
    assert_eq!(store.subscriber_count(&s), 0);
    assert_eq!(store.subscriber_count(&t), 1);

    // Updates for the old subject have no listener left.
    store.push_raw(s, account_bytes(s, 1_000), 99);
    store.push_raw(t, account_bytes(t, 8), 100);
    let state = within(observation.wait_for(|state| state.last_sequence.is_some()))
        .await
        .unwrap();
    assert_eq!(state.account().map(|a| a.amount), Some(8));
}

#[tokio::test]
async fn removing_source_tears_down_only_subscription() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let mut observation = live_account(&service, &store, s).await;
    store.push_raw(s, account_bytes(s, 130), 3);
    within(observation.wait_for(|state| state.last_sequence.is_some())).await;

    observation.set_source(None);
    eventually(|| store.subscriber_count(&s) == 0).await;

    let state = observation.state();
    assert_eq!(state.account().map(|a| a.amount), Some(130));
    assert_eq!(state.last_sequence, Some(SequenceMarker(3)));
    assert!(!state.loading);
}

#[tokio::test]
async fn reconnect_reopens_without_refetch() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let mut observation = live_account(&service, &store, s).await;
    assert_eq!(store.read_count(), 1);

    observation.set_connection(false);
    eventually(|| store.subscriber_count(&s) == 0).await;
    assert_eq!(amount(&observation), Some(100));

    observation.set_connection(true);
    eventually(|| store.subscriber_count(&s) == 1).await;
    store.push_raw(s, account_bytes(s, 111), 8);
    within(observation.wait_for(|state| state.last_sequence == Some(SequenceMarker(8)))).await;

    assert_eq!(store.read_count(), 1);
    assert_eq!(amount(&observation), Some(111));
}

#[tokio::test]
async fn dropping_handle_unsubscribes() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let observation = live_account(&service, &store, s).await;
    assert_eq!(store.subscriber_count(&s), 1);

    drop(observation);
    eventually(|| store.subscriber_count(&s) == 0).await;

    let metrics = service.metrics();
    eventually(|| metrics.snapshot().observations_stopped == 1).await;
    assert_eq!(metrics.open_subscriptions(), 0);
}

#[tokio::test]
async fn stop_twice_after_subscription_is_noop() {
    let store = Arc::new(InMemoryAccountStore::new());
    let s = subject(1);
    let service = service();
    let observation = live_account(&service, &store, s).await;

    observation.stop();
    observation.stop();
    eventually(|| observation.is_stopped()).await;
    assert_eq!(store.subscriber_count(&s), 0);

    let snapshot = service.metrics().snapshot();
    assert_eq!(snapshot.subscriptions_opened, 1);
    assert_eq!(snapshot.subscriptions_closed, 1);
}

#[tokio::test]
async fn live_mint_updates() {
    let store = Arc::new(InMemoryAccountStore::new());
    let m = subject(9);
    store.set_account(m, mint_bytes(1_000, 6));
    let service = service();
    let mut observation =
        service.observe_with_subscription(RecordKind::MintState, Some(m), source(&store));
    within(observation.wait_for(|state| state.value.is_some())).await;

    store.set_account(m, mint_bytes(2_000, 6));
    let state = within(observation.wait_for(|state| state.last_sequence.is_some()))
        .await
        .unwrap();
    assert_eq!(state.mint().map(|m| m.supply), Some(2_000));
    assert_eq!(state.mint().and_then(|m| m.mint_authority), Some(subject(0xCC)));
}
