//! # Fetch Controller
//!
//! Owns the single in-flight baseline read of an observation.
//!
//! The read runs on a spawned [`CancelableOperation`]; only the raw bytes
//! travel back to the driver, which decodes them through [`Self::complete`].

use std::sync::Arc;

use crate::application::cancelable::CancelableOperation;
use crate::application::reconciler::Event;
use crate::domain::{RecordKind, Subject, SyncError};
use crate::ports::{AccountDataSource, RecordDecoder};

/// Raw outcome of a baseline read.
pub type ReadOutcome = Result<Vec<u8>, SyncError>;

struct InFlight {
    subject: Subject,
    epoch: u64,
    operation: CancelableOperation,
}

/// Baseline fetch lifecycle for one observation.
pub struct FetchController {
    kind: RecordKind,
    decoder: Arc<dyn RecordDecoder>,
    in_flight: Option<InFlight>,
}

impl FetchController {
    /// Create a controller decoding records of `kind`.
    pub fn new(kind: RecordKind, decoder: Arc<dyn RecordDecoder>) -> Self {
        Self {
            kind,
            decoder,
            in_flight: None,
        }
    }

    /// Start reading `subject`, replacing any read in flight.
    ///
    /// `on_complete` receives the raw outcome unless the read is canceled
    /// first.
    pub fn start<C>(
        &mut self,
        subject: Subject,
        epoch: u64,
        source: Arc<dyn AccountDataSource>,
        on_complete: C,
    ) where
        C: FnOnce(ReadOutcome) + Send + 'static,
    {
        self.cancel();
        tracing::debug!(%subject, epoch, source = source.source_id(), "starting baseline read");

        let operation = CancelableOperation::start(
            async move { source.read(subject).await },
            on_complete,
        );
        self.in_flight = Some(InFlight {
            subject,
            epoch,
            operation,
        });
    }

    /// Cancel the read in flight.
    ///
    /// Returns `true` if a read was actually canceled; a read whose outcome
    /// was already delivered only stops being tracked.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                let canceled = in_flight.operation.cancel();
                if canceled {
                    tracing::debug!(
                        subject = %in_flight.subject,
                        epoch = in_flight.epoch,
                        "baseline read canceled"
                    );
                }
                canceled
            }
            None => false,
        }
    }

    /// Whether a read is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Settle the read tagged `epoch` and turn its outcome into an event.
    ///
    /// Returns `None` for an outcome that no longer belongs to the read in
    /// flight; its bytes are never decoded.
    pub fn complete(&mut self, epoch: u64, outcome: ReadOutcome) -> Option<Event> {
        if self.in_flight.as_ref().map(|in_flight| in_flight.epoch) != Some(epoch) {
            return None;
        }
        let in_flight = self.in_flight.take()?;

        let event = match outcome {
            Ok(bytes) => match self.decoder.decode(self.kind, &in_flight.subject, &bytes) {
                Ok(record) => Event::FetchSucceeded { epoch, record },
                Err(e) => {
                    tracing::warn!(subject = %in_flight.subject, epoch, "baseline decode failed: {}", e);
                    Event::FetchFailed {
                        epoch,
                        error: SyncError::Decode(e),
                    }
                }
            },
            Err(error) => {
                tracing::warn!(subject = %in_flight.subject, epoch, "baseline read failed: {}", error);
                Event::FetchFailed { epoch, error }
            }
        };
        Some(event)
    }
}

impl Drop for FetchController {
    fn drop(&mut self) {
        self.cancel();
    }
}
