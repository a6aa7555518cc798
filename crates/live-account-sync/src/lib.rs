//! # Live Account Sync
//!
//! Keeps a typed local view of a remote, binary-encoded account in step with
//! its authoritative source.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! An observation of one subject (an account or mint address):
//! - fetches the current bytes with a cancelable read and decodes them
//! - once a baseline exists, subscribes to push updates for the same subject
//! - accepts a push only if its slot is strictly newer than the last one
//! - tears everything down when the subject changes or observation stops
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | No stale overwrite | Every lifecycle has an epoch; old outcomes are dropped |
//! | Silent cancellation | Continuations run under the cancel gate |
//! | No early subscription | Subscriptions open only from the `Ready` phase |
//! | Decode isolation | Push decode errors never clear the value |
//! | Idempotent teardown | Handles close once; later closes are no-ops |
//!
//! ## Module Structure
//!
//! ```text
//! live-account-sync/
//! ├── domain/          # Subject, records, ObservationState, errors, invariants
//! ├── algorithms/      # SPL token codec, program-derived addresses
//! ├── ports/           # AccountObserver (inbound) + data source, decoder, deriver (outbound)
//! ├── application/     # Reconciler, controllers, driver, ObservationService
//! ├── adapters/        # In-memory store, read deadline, associated token deriver
//! ├── config.rs        # SyncConfig
//! ├── metrics.rs       # SyncMetrics
//! └── telemetry.rs     # tracing subscriber setup
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let service = ObservationService::new(SyncConfig::from_env());
//! let mut observation =
//!     service.observe_with_subscription(RecordKind::AccountState, Some(address), Some(source));
//! let state = observation.wait_for(|s| !s.loading).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod telemetry;

// Re-exports
pub use adapters::{AssociatedTokenDeriver, InMemoryAccountStore, TimeoutReader};
pub use algorithms::{
    decode_account, decode_mint, encode_account, encode_mint, find_associated_token_address,
    SplTokenCodec, ACCOUNT_LEN, ASSOCIATED_TOKEN_PROGRAM_ID, MINT_LEN, TOKEN_PROGRAM_ID,
};
pub use application::{
    CancelToken, CancelableOperation, DerivedObservation, Observation, ObservationService,
    Reconciler,
};
pub use config::SyncConfig;
pub use domain::{
    AccountState, AccountUpdate, DecodeError, DerivedObservationState, MintState,
    ObservationState, Record, RecordKind, SequenceMarker, Subject, SyncError,
};
pub use metrics::{MetricsSnapshot, SyncMetrics};
pub use ports::{
    AccountDataSource, AccountObserver, AddressDeriver, ChangeCallback, DerivedTarget,
    RecordDecoder, SubscriptionHandle,
};
pub use telemetry::{init_tracing, TelemetryError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
