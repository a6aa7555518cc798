//! # Inbound Ports
//!
//! API trait defining what callers can observe.

use std::sync::Arc;

use crate::application::{DerivedObservation, Observation};
use crate::domain::{RecordKind, Subject};
use crate::ports::outbound::AccountDataSource;

/// Base/owner pair a derived observation resolves into a subject.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DerivedTarget {
    /// Base subject (the mint).
    pub base: Option<Subject>,
    /// Owner whose subordinate account is observed.
    pub owner: Option<Subject>,
    /// Permit owners that cannot sign; `None` uses the configured default.
    pub allow_off_curve: Option<bool>,
}

impl DerivedTarget {
    /// Target with both halves present.
    pub fn new(base: Subject, owner: Subject) -> Self {
        Self {
            base: Some(base),
            owner: Some(owner),
            allow_off_curve: None,
        }
    }

    /// Override the off-curve policy.
    pub fn allow_off_curve(mut self, allow: bool) -> Self {
        self.allow_off_curve = Some(allow);
        self
    }

    /// Both halves present.
    pub fn is_complete(&self) -> bool {
        self.base.is_some() && self.owner.is_some()
    }
}

/// Account observation API - inbound port.
///
/// Every returned handle keeps its observation alive until it is stopped or
/// dropped. Handles must be created inside a Tokio runtime.
pub trait AccountObserver: Send + Sync {
    /// Fetch `subject` once and expose the result.
    ///
    /// Nothing is fetched while `subject` or `source` is absent.
    fn observe(
        &self,
        kind: RecordKind,
        subject: Option<Subject>,
        source: Option<Arc<dyn AccountDataSource>>,
    ) -> Observation;

    /// Fetch `subject`, then follow its push updates through `source`.
    fn observe_with_subscription(
        &self,
        kind: RecordKind,
        subject: Option<Subject>,
        source: Option<Arc<dyn AccountDataSource>>,
    ) -> Observation;

    /// Resolve `target` into a subordinate address, then observe it.
    ///
    /// `live` follows push updates once the baseline exists.
    fn observe_derived(
        &self,
        kind: RecordKind,
        target: DerivedTarget,
        source: Option<Arc<dyn AccountDataSource>>,
        live: bool,
    ) -> DerivedObservation;
}
