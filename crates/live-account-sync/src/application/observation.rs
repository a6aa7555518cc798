//! # Observation Driver
//!
//! One driver task per observation. It owns the [`Reconciler`], the
//! [`FetchController`] and the [`SubscriptionController`], and consumes a
//! single ordered queue of caller commands, read outcomes, push updates and
//! derivation outcomes. It is the only writer of the published state.
//!
//! Reads and derivations run on their own tasks and report back through
//! the queue, tagged with the epoch they were started under. Push callbacks
//! do the same, so a callback firing after teardown lands in the queue as a
//! stale message and is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use crate::adapters::TimeoutReader;
use crate::application::cancelable::CancelableOperation;
use crate::application::fetch::{FetchController, ReadOutcome};
use crate::application::reconciler::{Disposition, Effect, Event, Reconciler};
use crate::application::subscription::SubscriptionController;
use crate::domain::{
    AccountUpdate, DerivedObservationState, ObservationState, RecordKind, Subject, SyncError,
};
use crate::metrics::SyncMetrics;
use crate::ports::{
    AccountDataSource, AddressDeriver, ChangeCallback, DerivedTarget, RecordDecoder,
};

/// Messages consumed by a driver task.
pub(crate) enum DriverMessage {
    SetSubject(Option<Subject>),
    SetTarget(DerivedTarget),
    Refresh,
    SetSource(Option<Arc<dyn AccountDataSource>>),
    SetConnection(bool),
    FetchDone {
        epoch: u64,
        outcome: ReadOutcome,
    },
    Push {
        epoch: u64,
        update: AccountUpdate,
    },
    Resolved {
        epoch: u64,
        outcome: Result<Subject, SyncError>,
    },
    Stop,
}

type CommandSender = mpsc::UnboundedSender<DriverMessage>;

/// Shared collaborators of every driver spawned by one service.
#[derive(Clone)]
pub(crate) struct DriverContext {
    pub kind: RecordKind,
    pub live: bool,
    pub decoder: Arc<dyn RecordDecoder>,
    pub metrics: Arc<SyncMetrics>,
    pub read_timeout: Option<Duration>,
}

/// Resolution of a derived subject.
struct Derivation {
    target: DerivedTarget,
    allow_off_curve: bool,
    deriver: Arc<dyn AddressDeriver>,
    epoch: u64,
    operation: Option<CancelableOperation>,
    resolved: Option<Subject>,
    error: Option<SyncError>,
}

impl Derivation {
    /// Drop the current resolution and bump the epoch.
    fn reset(&mut self) {
        if let Some(operation) = self.operation.take() {
            operation.cancel();
        }
        self.epoch += 1;
        self.resolved = None;
        self.error = None;
    }

    /// Start resolving the current target, if it is complete.
    fn start(&mut self, tx: &CommandSender) {
        let (Some(base), Some(owner)) = (self.target.base, self.target.owner) else {
            return;
        };
        let allow_off_curve = self.target.allow_off_curve.unwrap_or(self.allow_off_curve);
        let deriver = self.deriver.clone();
        let epoch = self.epoch;
        let tx = tx.clone();

        tracing::debug!(%base, %owner, epoch, "resolving derived subject");
        self.operation = Some(CancelableOperation::start(
            async move { deriver.derive(base, owner, allow_off_curve).await },
            move |outcome| {
                let _ = tx.send(DriverMessage::Resolved { epoch, outcome });
            },
        ));
    }

    /// Record a resolution outcome. Returns `false` for a stale one.
    fn settle(&mut self, epoch: u64, outcome: Result<Subject, SyncError>) -> bool {
        if epoch != self.epoch || self.operation.is_none() {
            return false;
        }
        self.operation = None;
        match outcome {
            Ok(subject) => self.resolved = Some(subject),
            Err(error) => self.error = Some(error),
        }
        true
    }
}

enum SubjectSource {
    Direct(Option<Subject>),
    Derived(Box<Derivation>),
}

enum Publisher {
    Direct(watch::Sender<ObservationState>),
    Derived(watch::Sender<DerivedObservationState>),
}

fn publish_if_changed<T: PartialEq>(sender: &watch::Sender<T>, next: T) {
    sender.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

struct Driver {
    reconciler: Reconciler,
    fetch: FetchController,
    subscription: SubscriptionController,
    subject_source: SubjectSource,
    source: Option<Arc<dyn AccountDataSource>>,
    connected: bool,
    read_timeout: Option<Duration>,
    tx: CommandSender,
    publisher: Publisher,
    metrics: Arc<SyncMetrics>,
}

impl Driver {
    fn new(
        ctx: DriverContext,
        subject_source: SubjectSource,
        source: Option<Arc<dyn AccountDataSource>>,
        tx: CommandSender,
        publisher: Publisher,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(ctx.live),
            fetch: FetchController::new(ctx.kind, ctx.decoder.clone()),
            subscription: SubscriptionController::new(ctx.kind, ctx.decoder),
            subject_source,
            source: source.map(|source| TimeoutReader::apply(source, ctx.read_timeout)),
            connected: true,
            read_timeout: ctx.read_timeout,
            tx,
            publisher,
            metrics: ctx.metrics,
        }
    }

    /// Establish the first lifecycle before the task starts.
    fn bootstrap(&mut self) {
        self.metrics.record_observation_started();
        self.sync_connection();
        match self.subject_source {
            SubjectSource::Direct(_) => self.restart(),
            SubjectSource::Derived(_) => self.retarget(),
        }
        self.publish();
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<DriverMessage>) {
        tracing::debug!("[live-sync] observation driver started");

        while let Some(message) = rx.recv().await {
            if !self.handle(message) {
                break;
            }
            self.publish();
        }

        self.shutdown();
        tracing::debug!("[live-sync] observation driver stopped");
    }

    fn handle(&mut self, message: DriverMessage) -> bool {
        match message {
            DriverMessage::SetSubject(subject) => match &mut self.subject_source {
                SubjectSource::Direct(current) => {
                    *current = subject;
                    self.restart();
                }
                SubjectSource::Derived(_) => {
                    tracing::warn!("subject of a derived observation is resolved, not set");
                }
            },
            DriverMessage::SetTarget(target) => match &mut self.subject_source {
                SubjectSource::Derived(derivation) => {
                    derivation.target = target;
                    self.retarget();
                }
                SubjectSource::Direct(_) => {
                    tracing::warn!("direct observation has no derivation target");
                }
            },
            DriverMessage::Refresh => self.refresh(),
            DriverMessage::SetSource(source) => {
                let attached = source.is_some();
                self.source = source.map(|source| TimeoutReader::apply(source, self.read_timeout));
                if attached {
                    self.restart();
                }
                self.sync_connection();
            }
            DriverMessage::SetConnection(connected) => {
                self.connected = connected;
                self.sync_connection();
            }
            DriverMessage::FetchDone { epoch, outcome } => self.on_fetch_done(epoch, outcome),
            DriverMessage::Push { epoch, update } => self.on_push(epoch, update),
            DriverMessage::Resolved { epoch, outcome } => self.on_resolved(epoch, outcome),
            DriverMessage::Stop => return false,
        }
        true
    }

    /// Subject the lifecycle should currently run for.
    fn lifecycle_subject(&self) -> Option<Subject> {
        let subject = match &self.subject_source {
            SubjectSource::Direct(subject) => *subject,
            SubjectSource::Derived(derivation) => derivation.resolved,
        };
        subject.filter(|_| self.source.is_some())
    }

    /// Tear down the current lifecycle and start a new one.
    fn restart(&mut self) {
        let subject = self.lifecycle_subject();
        let step = self.reconciler.apply(Event::SubjectChanged(subject));
        self.execute(step.effects);
    }

    /// Re-run derivation from scratch for the current target.
    fn retarget(&mut self) {
        if let SubjectSource::Derived(derivation) = &mut self.subject_source {
            derivation.reset();
        }
        self.restart();
        if let SubjectSource::Derived(derivation) = &mut self.subject_source {
            derivation.start(&self.tx);
        }
    }

    fn refresh(&mut self) {
        let unresolved = matches!(
            &self.subject_source,
            SubjectSource::Derived(derivation) if derivation.resolved.is_none()
        );
        if unresolved {
            self.retarget();
        } else {
            self.restart();
        }
    }

    fn sync_connection(&mut self) {
        let connected = self.connected && self.source.is_some();
        let step = self.reconciler.apply(Event::ConnectionChanged(connected));
        self.execute(step.effects);
    }

    fn on_fetch_done(&mut self, epoch: u64, outcome: ReadOutcome) {
        let Some(event) = self.fetch.complete(epoch, outcome) else {
            tracing::trace!(epoch, "dropping stale read outcome");
            return;
        };
        let succeeded = matches!(event, Event::FetchSucceeded { .. });
        let step = self.reconciler.apply(event);
        if step.disposition == Disposition::Applied {
            self.metrics.record_fetch_outcome(succeeded);
        }
        self.execute(step.effects);
    }

    fn on_push(&mut self, epoch: u64, update: AccountUpdate) {
        let slot = update.marker.slot();
        let disposition = match self.subscription.receive(epoch, update) {
            Some(event) => {
                let step = self.reconciler.apply(event);
                self.execute(step.effects);
                step.disposition
            }
            None => Disposition::Stale,
        };
        tracing::trace!(epoch, slot, ?disposition, "push update handled");
        self.metrics.record_push(disposition);
    }

    fn on_resolved(&mut self, epoch: u64, outcome: Result<Subject, SyncError>) {
        let SubjectSource::Derived(derivation) = &mut self.subject_source else {
            return;
        };
        let failed = outcome.is_err();
        if !derivation.settle(epoch, outcome) {
            tracing::trace!(epoch, "dropping stale derivation outcome");
            return;
        }
        if failed {
            if let Some(error) = &derivation.error {
                tracing::warn!(epoch, "derivation failed: {}", error);
            }
            self.metrics.record_derivation_failed();
            return;
        }
        self.restart();
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::CancelFetch => {
                    if self.fetch.cancel() {
                        self.metrics.record_fetch_canceled();
                    }
                }
                Effect::CloseSubscription => {
                    if self.subscription.close() {
                        self.metrics.record_subscription_closed();
                    }
                }
                Effect::StartFetch { subject, epoch } => {
                    let Some(source) = &self.source else {
                        continue;
                    };
                    let tx = self.tx.clone();
                    self.fetch.start(subject, epoch, source.clone(), move |outcome| {
                        let _ = tx.send(DriverMessage::FetchDone { epoch, outcome });
                    });
                    self.metrics.record_fetch_started();
                }
                Effect::OpenSubscription { subject, epoch } => {
                    let Some(source) = &self.source else {
                        continue;
                    };
                    let tx = self.tx.clone();
                    let on_change: ChangeCallback = Arc::new(move |update| {
                        let _ = tx.send(DriverMessage::Push { epoch, update });
                    });
                    if self.subscription.open(subject, epoch, source, on_change) {
                        self.metrics.record_subscription_opened();
                    }
                }
            }
        }
    }

    fn publish(&self) {
        let mut state = self.reconciler.view();
        match &self.publisher {
            Publisher::Direct(sender) => publish_if_changed(sender, state),
            Publisher::Derived(sender) => {
                let resolved_subject = match &self.subject_source {
                    SubjectSource::Derived(derivation) => {
                        if let Some(error) = &derivation.error {
                            state.error = Some(error.clone());
                            state.loading = false;
                        }
                        derivation.resolved
                    }
                    SubjectSource::Direct(_) => None,
                };
                publish_if_changed(
                    sender,
                    DerivedObservationState {
                        resolved_subject,
                        state,
                    },
                );
            }
        }
    }

    fn shutdown(&mut self) {
        let step = self.reconciler.apply(Event::Unobserved);
        self.execute(step.effects);
        if let SubjectSource::Derived(derivation) = &mut self.subject_source {
            if let Some(operation) = derivation.operation.take() {
                operation.cancel();
            }
        }
        self.metrics.record_observation_stopped();
    }
}

fn spawn_driver(
    ctx: DriverContext,
    subject_source: SubjectSource,
    source: Option<Arc<dyn AccountDataSource>>,
    publisher: Publisher,
) -> CommandSender {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut driver = Driver::new(ctx, subject_source, source, tx.clone(), publisher);
    driver.bootstrap();
    tokio::spawn(driver.run(rx));
    tx
}

/// Handle to a running observation of one subject.
///
/// Dropping the handle stops the observation.
pub struct Observation {
    commands: CommandSender,
    state: watch::Receiver<ObservationState>,
}

impl Observation {
    pub(crate) fn spawn(
        ctx: DriverContext,
        subject: Option<Subject>,
        source: Option<Arc<dyn AccountDataSource>>,
    ) -> Self {
        let (sender, state) = watch::channel(ObservationState::default());
        let commands = spawn_driver(
            ctx,
            SubjectSource::Direct(subject),
            source,
            Publisher::Direct(sender),
        );
        Self { commands, state }
    }

    /// Point-in-time snapshot.
    pub fn state(&self) -> ObservationState {
        self.state.borrow().clone()
    }

    /// Wait for the next published state.
    ///
    /// Returns `None` once the observation has stopped.
    pub async fn changed(&mut self) -> Option<ObservationState> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// Wait until a published state satisfies `predicate`, checking the
    /// current one first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&ObservationState) -> bool,
    ) -> Option<ObservationState> {
        let state = self.state.wait_for(|state| predicate(state)).await.ok()?;
        Some(state.clone())
    }

    /// Receiver of future states.
    pub fn watch(&self) -> watch::Receiver<ObservationState> {
        self.state.clone()
    }

    /// Stream of states, starting with the current one.
    pub fn updates(&self) -> impl Stream<Item = ObservationState> {
        WatchStream::new(self.state.clone())
    }

    /// Replace the observed subject. `None` clears it.
    pub fn set_subject(&self, subject: Option<Subject>) {
        self.send(DriverMessage::SetSubject(subject));
    }

    /// Re-supply the current subject, restarting its lifecycle.
    pub fn refresh(&self) {
        self.send(DriverMessage::Refresh);
    }

    /// Replace the data source. `None` tears down only the subscription.
    pub fn set_source(&self, source: Option<Arc<dyn AccountDataSource>>) {
        self.send(DriverMessage::SetSource(source));
    }

    /// Report push connectivity of the data source.
    pub fn set_connection(&self, connected: bool) {
        self.send(DriverMessage::SetConnection(connected));
    }

    /// Stop observing. Idempotent.
    pub fn stop(&self) {
        self.send(DriverMessage::Stop);
    }

    /// Whether the driver has shut down.
    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, message: DriverMessage) {
        let _ = self.commands.send(message);
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle to a running resolve-then-observe composition.
///
/// Dropping the handle stops the observation.
pub struct DerivedObservation {
    commands: CommandSender,
    target: DerivedTarget,
    state: watch::Receiver<DerivedObservationState>,
}

impl DerivedObservation {
    pub(crate) fn spawn(
        ctx: DriverContext,
        target: DerivedTarget,
        deriver: Arc<dyn AddressDeriver>,
        allow_off_curve: bool,
        source: Option<Arc<dyn AccountDataSource>>,
    ) -> Self {
        let (sender, state) = watch::channel(DerivedObservationState::default());
        let derivation = Derivation {
            target,
            allow_off_curve,
            deriver,
            epoch: 0,
            operation: None,
            resolved: None,
            error: None,
        };
        let commands = spawn_driver(
            ctx,
            SubjectSource::Derived(Box::new(derivation)),
            source,
            Publisher::Derived(sender),
        );
        Self {
            commands,
            target,
            state,
        }
    }

    /// Point-in-time snapshot.
    pub fn state(&self) -> DerivedObservationState {
        self.state.borrow().clone()
    }

    /// Wait for the next published state.
    ///
    /// Returns `None` once the observation has stopped.
    pub async fn changed(&mut self) -> Option<DerivedObservationState> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// Wait until a published state satisfies `predicate`, checking the
    /// current one first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&DerivedObservationState) -> bool,
    ) -> Option<DerivedObservationState> {
        let state = self.state.wait_for(|state| predicate(state)).await.ok()?;
        Some(state.clone())
    }

    /// Receiver of future states.
    pub fn watch(&self) -> watch::Receiver<DerivedObservationState> {
        self.state.clone()
    }

    /// Stream of observation states, starting with the current one.
    pub fn updates(&self) -> impl Stream<Item = ObservationState> {
        WatchStream::new(self.state.clone()).map(|derived| derived.state)
    }

    /// Current derivation target.
    pub fn target(&self) -> DerivedTarget {
        self.target
    }

    /// Replace the whole target and re-run derivation.
    pub fn set_target(&mut self, target: DerivedTarget) {
        self.target = target;
        self.send(DriverMessage::SetTarget(target));
    }

    /// Replace the base subject and re-run derivation.
    pub fn set_base(&mut self, base: Option<Subject>) {
        self.set_target(DerivedTarget { base, ..self.target });
    }

    /// Replace the owner and re-run derivation.
    pub fn set_owner(&mut self, owner: Option<Subject>) {
        self.set_target(DerivedTarget { owner, ..self.target });
    }

    /// Restart the lifecycle; re-runs derivation if it has not resolved.
    pub fn refresh(&self) {
        self.send(DriverMessage::Refresh);
    }

    /// Replace the data source. `None` tears down only the subscription.
    pub fn set_source(&self, source: Option<Arc<dyn AccountDataSource>>) {
        self.send(DriverMessage::SetSource(source));
    }

    /// Report push connectivity of the data source.
    pub fn set_connection(&self, connected: bool) {
        self.send(DriverMessage::SetConnection(connected));
    }

    /// Stop observing. Idempotent.
    pub fn stop(&self) {
        self.send(DriverMessage::Stop);
    }

    /// Whether the driver has shut down.
    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, message: DriverMessage) {
        let _ = self.commands.send(message);
    }
}

impl Drop for DerivedObservation {
    fn drop(&mut self) {
        self.stop();
    }
}
