//! # Subscription Controller
//!
//! Owns the single push subscription of an observation.
//!
//! A subscription is keyed on `(subject, epoch)`: opening the same key twice
//! is a no-op, so content changes of the baseline never cause a re-open.

use std::sync::Arc;

use crate::application::reconciler::Event;
use crate::domain::{AccountUpdate, RecordKind, Subject};
use crate::ports::{AccountDataSource, ChangeCallback, RecordDecoder, SubscriptionHandle};

struct Active {
    subject: Subject,
    epoch: u64,
    handle: SubscriptionHandle,
}

/// Push subscription lifecycle for one observation.
pub struct SubscriptionController {
    kind: RecordKind,
    decoder: Arc<dyn RecordDecoder>,
    active: Option<Active>,
}

impl SubscriptionController {
    /// Create a controller decoding updates as `kind`.
    pub fn new(kind: RecordKind, decoder: Arc<dyn RecordDecoder>) -> Self {
        Self {
            kind,
            decoder,
            active: None,
        }
    }

    /// Subscribe to `subject` through `source`.
    ///
    /// Returns `false` when the same key is already open.
    pub fn open(
        &mut self,
        subject: Subject,
        epoch: u64,
        source: &Arc<dyn AccountDataSource>,
        on_change: ChangeCallback,
    ) -> bool {
        if let Some(active) = &self.active {
            if active.subject == subject && active.epoch == epoch {
                return false;
            }
        }
        self.close();

        let handle = source.subscribe(subject, on_change);
        tracing::debug!(%subject, epoch, source = source.source_id(), "subscription opened");
        self.active = Some(Active {
            subject,
            epoch,
            handle,
        });
        true
    }

    /// Close the active subscription.
    ///
    /// Idempotent and infallible; returns `true` only if one was closed.
    pub fn close(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        active.handle.close();
        tracing::debug!(subject = %active.subject, epoch = active.epoch, "subscription closed");
        true
    }

    /// Whether a subscription is open.
    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Whether updates tagged `epoch` belong to the open subscription.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.active.as_ref().is_some_and(|active| active.epoch == epoch)
    }

    /// Decode a pushed update into an event.
    ///
    /// Updates that do not belong to the open subscription are dropped
    /// without decoding.
    pub fn receive(&self, epoch: u64, update: AccountUpdate) -> Option<Event> {
        let active = self.active.as_ref().filter(|active| active.epoch == epoch)?;
        let outcome = self.decoder.decode(self.kind, &active.subject, &update.data);
        if let Err(e) = &outcome {
            tracing::warn!(subject = %active.subject, slot = update.marker.slot(), "push decode failed: {}", e);
        }
        Some(Event::PushReceived {
            epoch,
            marker: update.marker,
            outcome,
        })
    }
}

impl Drop for SubscriptionController {
    fn drop(&mut self) {
        self.close();
    }
}
