//! # Observation Service
//!
//! Application service creating observations over shared collaborators.
//!
//! Every observation created by one service shares its decoder, deriver
//! and metrics, and owns everything else.

use std::sync::Arc;

use crate::adapters::AssociatedTokenDeriver;
use crate::algorithms::SplTokenCodec;
use crate::application::observation::{DerivedObservation, DriverContext, Observation};
use crate::config::SyncConfig;
use crate::domain::{RecordKind, Subject};
use crate::metrics::SyncMetrics;
use crate::ports::{AccountDataSource, AccountObserver, AddressDeriver, DerivedTarget, RecordDecoder};

/// Observation Service - creates and wires observations.
pub struct ObservationService {
    /// Configuration.
    config: SyncConfig,
    /// Decoder shared by all observations.
    decoder: Arc<dyn RecordDecoder>,
    /// Deriver for derived observations.
    deriver: Arc<dyn AddressDeriver>,
    /// Engine-wide counters.
    metrics: Arc<SyncMetrics>,
}

impl ObservationService {
    /// Create a service decoding SPL token layouts and deriving associated
    /// token accounts under the configured programs.
    pub fn new(config: SyncConfig) -> Self {
        let deriver = AssociatedTokenDeriver::from_config(&config);
        Self {
            config,
            decoder: Arc::new(SplTokenCodec),
            deriver: Arc::new(deriver),
            metrics: Arc::new(SyncMetrics::new()),
        }
    }

    /// Replace the record decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn RecordDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the address deriver.
    pub fn with_deriver(mut self, deriver: Arc<dyn AddressDeriver>) -> Self {
        self.deriver = deriver;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Engine-wide counters.
    pub fn metrics(&self) -> Arc<SyncMetrics> {
        self.metrics.clone()
    }

    fn context(&self, kind: RecordKind, live: bool) -> DriverContext {
        DriverContext {
            kind,
            live,
            decoder: self.decoder.clone(),
            metrics: self.metrics.clone(),
            read_timeout: self.config.read_timeout(),
        }
    }

    fn spawn(
        &self,
        kind: RecordKind,
        subject: Option<Subject>,
        source: Option<Arc<dyn AccountDataSource>>,
        live: bool,
    ) -> Observation {
        tracing::info!(
            "[live-sync] observing {} {} (live: {})",
            kind,
            subject.map_or_else(|| "<none>".to_string(), |s| s.to_string()),
            live
        );
        Observation::spawn(self.context(kind, live), subject, source)
    }
}

impl Default for ObservationService {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl AccountObserver for ObservationService {
    fn observe(
        &self,
        kind: RecordKind,
        subject: Option<Subject>,
        source: Option<Arc<dyn AccountDataSource>>,
    ) -> Observation {
        self.spawn(kind, subject, source, false)
    }

    fn observe_with_subscription(
        &self,
        kind: RecordKind,
        subject: Option<Subject>,
        source: Option<Arc<dyn AccountDataSource>>,
    ) -> Observation {
        self.spawn(kind, subject, source, true)
    }

    fn observe_derived(
        &self,
        kind: RecordKind,
        target: DerivedTarget,
        source: Option<Arc<dyn AccountDataSource>>,
        live: bool,
    ) -> DerivedObservation {
        tracing::info!(
            "[live-sync] observing derived {} (live: {})",
            kind,
            live
        );
        DerivedObservation::spawn(
            self.context(kind, live),
            target,
            self.deriver.clone(),
            self.config.allow_owner_off_curve,
            source,
        )
    }
}
