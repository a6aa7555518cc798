//! # Application Module
//!
//! The observation engine: cancellation primitive, fetch and subscription
//! controllers, the reconciler state machine, the per-observation driver
//! and the service creating observations.

pub mod cancelable;
pub mod fetch;
pub mod observation;
pub mod reconciler;
pub mod service;
pub mod subscription;

pub use cancelable::{CancelToken, CancelableOperation, Canceled};
pub use fetch::{FetchController, ReadOutcome};
pub use observation::{DerivedObservation, Observation};
pub use reconciler::{Disposition, Effect, Event, LiveValue, Phase, Reconciler, Step};
pub use service::ObservationService;
pub use subscription::SubscriptionController;
