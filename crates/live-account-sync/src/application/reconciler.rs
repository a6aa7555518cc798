//! # Reconciler
//!
//! Pure per-observation state machine merging the baseline fetch and push
//! updates into one view.
//!
//! ## Phases
//!
//! ```text
//! Idle ──SubjectChanged(Some)──► Fetching ──FetchSucceeded──► Ready
//!   ▲                               │                          │
//!   └──SubjectChanged(None)─────────┴──FetchFailed──► Failed   └─PushReceived─► Ready
//! ```
//!
//! Every transition returns the side effects the driver must perform. The
//! machine never performs I/O itself, so every ordering rule can be tested
//! synchronously.
//!
//! Each lifecycle is tagged with an epoch. Fetch outcomes and push updates
//! carry the epoch they were started under; anything from an older epoch is
//! stale and dropped.

use crate::domain::{
    invariant_newer_sequence, DecodeError, ObservationState, Record, SequenceMarker, Subject,
    SyncError,
};

/// Latest push update accepted for the current subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveValue {
    /// Decoded record.
    pub record: Record,
    /// Marker the update arrived with.
    pub marker: SequenceMarker,
}

/// Lifecycle phase of one observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No subject.
    Idle,
    /// Baseline read outstanding.
    Fetching {
        /// Subject being fetched.
        subject: Subject,
    },
    /// Baseline present; push updates may follow.
    Ready {
        /// Observed subject.
        subject: Subject,
        /// Decoded baseline.
        baseline: Record,
        /// Most recent accepted push, which overrides the baseline.
        live: Option<LiveValue>,
        /// Last push decode failure.
        error: Option<SyncError>,
    },
    /// Baseline read or decode failed.
    Failed {
        /// Observed subject.
        subject: Subject,
        /// Failure cause.
        error: SyncError,
    },
}

impl Phase {
    /// Subject of this phase, if any.
    pub fn subject(&self) -> Option<Subject> {
        match self {
            Self::Idle => None,
            Self::Fetching { subject }
            | Self::Ready { subject, .. }
            | Self::Failed { subject, .. } => Some(*subject),
        }
    }
}

/// Input to the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The observed subject was set, replaced, re-supplied or cleared.
    SubjectChanged(Option<Subject>),
    /// Baseline read and decode succeeded.
    FetchSucceeded {
        /// Epoch the fetch was started under.
        epoch: u64,
        /// Decoded baseline.
        record: Record,
    },
    /// Baseline read or decode failed.
    FetchFailed {
        /// Epoch the fetch was started under.
        epoch: u64,
        /// Failure cause.
        error: SyncError,
    },
    /// A push update arrived and was decoded.
    PushReceived {
        /// Epoch the subscription was opened under.
        epoch: u64,
        /// Marker supplied by the data source.
        marker: SequenceMarker,
        /// Decode result of the pushed bytes.
        outcome: Result<Record, DecodeError>,
    },
    /// Push connectivity appeared or went away.
    ConnectionChanged(bool),
    /// The caller stopped observing.
    Unobserved,
}

/// Side effect requested by a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Cancel the in-flight baseline read, if any.
    CancelFetch,
    /// Close the active subscription, if any.
    CloseSubscription,
    /// Start a baseline read.
    StartFetch {
        /// Subject to read.
        subject: Subject,
        /// Epoch to tag the outcome with.
        epoch: u64,
    },
    /// Open a push subscription.
    OpenSubscription {
        /// Subject to subscribe to.
        subject: Subject,
        /// Epoch to tag updates with.
        epoch: u64,
    },
}

/// How an event was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// The event changed the state.
    Applied,
    /// The event belonged to an older lifecycle or was out of order.
    Stale,
    /// A push update failed to decode.
    Rejected,
    /// The event had nothing to act on.
    Ignored,
}

/// Result of one transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    /// Effects to perform, in order.
    pub effects: Vec<Effect>,
    /// How the event was handled.
    pub disposition: Disposition,
}

impl Step {
    fn applied(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            disposition: Disposition::Applied,
        }
    }

    fn only(disposition: Disposition) -> Self {
        Self {
            effects: Vec::new(),
            disposition,
        }
    }
}

/// The per-observation state machine.
#[derive(Clone, Debug)]
pub struct Reconciler {
    phase: Phase,
    epoch: u64,
    live_enabled: bool,
    connected: bool,
    subscribed: bool,
    terminated: bool,
}

impl Reconciler {
    /// Create an idle reconciler. `live_enabled` allows push subscriptions.
    pub fn new(live_enabled: bool) -> Self {
        Self {
            phase: Phase::Idle,
            epoch: 0,
            live_enabled,
            connected: true,
            subscribed: false,
            terminated: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Epoch of the current lifecycle.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a subscription is requested to be open.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Whether `Unobserved` has been applied.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Whether a push tagged with `epoch` would be considered at all.
    pub fn accepts_push(&self, epoch: u64) -> bool {
        !self.terminated
            && self.subscribed
            && epoch == self.epoch
            && matches!(self.phase, Phase::Ready { .. })
    }

    /// Apply one event.
    pub fn apply(&mut self, event: Event) -> Step {
        if self.terminated {
            return Step::only(Disposition::Ignored);
        }

        match event {
            Event::SubjectChanged(subject) => self.on_subject_changed(subject),
            Event::FetchSucceeded { epoch, record } => self.on_fetch_succeeded(epoch, record),
            Event::FetchFailed { epoch, error } => self.on_fetch_failed(epoch, error),
            Event::PushReceived {
                epoch,
                marker,
                outcome,
            } => self.on_push(epoch, marker, outcome),
            Event::ConnectionChanged(connected) => self.on_connection_changed(connected),
            Event::Unobserved => {
                self.terminated = true;
                self.subscribed = false;
                Step::applied(vec![Effect::CancelFetch, Effect::CloseSubscription])
            }
        }
    }

    fn on_subject_changed(&mut self, subject: Option<Subject>) -> Step {
        // Teardown of the previous lifecycle always precedes the new one.
        let mut effects = vec![Effect::CancelFetch, Effect::CloseSubscription];
        self.subscribed = false;
        self.epoch += 1;

        match subject {
            Some(subject) => {
                self.phase = Phase::Fetching { subject };
                effects.push(Effect::StartFetch {
                    subject,
                    epoch: self.epoch,
                });
            }
            None => self.phase = Phase::Idle,
        }
        Step::applied(effects)
    }

    fn on_fetch_succeeded(&mut self, epoch: u64, record: Record) -> Step {
        let subject = match self.phase {
            Phase::Fetching { subject } if epoch == self.epoch => subject,
            _ => return Step::only(Disposition::Stale),
        };

        self.phase = Phase::Ready {
            subject,
            baseline: record,
            live: None,
            error: None,
        };

        let mut effects = Vec::new();
        if self.live_enabled && self.connected {
            self.subscribed = true;
            effects.push(Effect::OpenSubscription {
                subject,
                epoch: self.epoch,
            });
        }
        Step::applied(effects)
    }

    fn on_fetch_failed(&mut self, epoch: u64, error: SyncError) -> Step {
        let subject = match self.phase {
            Phase::Fetching { subject } if epoch == self.epoch => subject,
            _ => return Step::only(Disposition::Stale),
        };
        self.phase = Phase::Failed { subject, error };
        Step::applied(Vec::new())
    }

    fn on_push(
        &mut self,
        epoch: u64,
        marker: SequenceMarker,
        outcome: Result<Record, DecodeError>,
    ) -> Step {
        if !self.accepts_push(epoch) {
            return Step::only(Disposition::Stale);
        }
        let Phase::Ready { live, error, .. } = &mut self.phase else {
            return Step::only(Disposition::Stale);
        };

        match outcome {
            Err(decode) => {
                *error = Some(SyncError::SubscriptionDecode(decode));
                Step::only(Disposition::Rejected)
            }
            Ok(record) => {
                let last = live.as_ref().map(|live| live.marker);
                if !invariant_newer_sequence(last, marker) {
                    return Step::only(Disposition::Stale);
                }
                *live = Some(LiveValue { record, marker });
                Step::applied(Vec::new())
            }
        }
    }

    fn on_connection_changed(&mut self, connected: bool) -> Step {
        if self.connected == connected {
            return Step::only(Disposition::Ignored);
        }
        self.connected = connected;

        if !connected {
            if self.subscribed {
                self.subscribed = false;
                return Step::applied(vec![Effect::CloseSubscription]);
            }
            return Step::only(Disposition::Ignored);
        }

        match self.phase {
            Phase::Ready { subject, .. } if self.live_enabled && !self.subscribed => {
                self.subscribed = true;
                Step::applied(vec![Effect::OpenSubscription {
                    subject,
                    epoch: self.epoch,
                }])
            }
            _ => Step::only(Disposition::Ignored),
        }
    }

    /// The view exposed to callers.
    pub fn view(&self) -> ObservationState {
        match &self.phase {
            Phase::Idle => ObservationState::default(),
            Phase::Fetching { subject } => ObservationState::loading(*subject),
            Phase::Ready {
                subject,
                baseline,
                live,
                error,
            } => ObservationState {
                subject: Some(*subject),
                loading: false,
                value: Some(
                    live.as_ref()
                        .map_or_else(|| baseline.clone(), |live| live.record.clone()),
                ),
                error: error.clone(),
                last_sequence: live.as_ref().map(|live| live.marker),
            },
            Phase::Failed { subject, error } => ObservationState {
                subject: Some(*subject),
                loading: false,
                value: None,
                error: Some(error.clone()),
                last_sequence: None,
            },
        }
    }
}
