//! # Outbound Ports
//!
//! Capabilities the engine consumes: the data source (one-shot read plus
//! push subscription), the record decoder and the address deriver.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{AccountUpdate, DecodeError, Record, RecordKind, Subject, SyncError};

/// Callback invoked by a data source on every change of a subscribed record.
pub type ChangeCallback = Arc<dyn Fn(AccountUpdate) + Send + Sync>;

/// Owned handle to an open push subscription.
///
/// `close()` is idempotent and never fails; dropping the handle closes it.
pub struct SubscriptionHandle {
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    /// Wrap the teardown action of an established subscription.
    pub fn new(closer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            closer: Some(Box::new(closer)),
        }
    }

    /// Handle for a subscription that has nothing to tear down.
    pub fn detached() -> Self {
        Self { closer: None }
    }

    /// Tear down the subscription.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&mut self) -> bool {
        match self.closer.take() {
            Some(closer) => {
                closer();
                true
            }
            None => false,
        }
    }

    /// True once closed (or if never established).
    pub fn is_closed(&self) -> bool {
        self.closer.is_none()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Data source - outbound port.
///
/// May be shared read-only across any number of observations.
#[async_trait]
pub trait AccountDataSource: Send + Sync {
    /// Read the current raw bytes of `subject`.
    ///
    /// Transport and not-found conditions fail with [`SyncError::Read`].
    async fn read(&self, subject: Subject) -> Result<Vec<u8>, SyncError>;

    /// Register `on_change` for every future change of `subject`.
    fn subscribe(&self, subject: Subject, on_change: ChangeCallback) -> SubscriptionHandle;

    /// Identifier for logging.
    fn source_id(&self) -> &str {
        "data-source"
    }
}

/// Record decoder - outbound port.
pub trait RecordDecoder: Send + Sync {
    /// Decode `data` stored at `subject` as a record of `kind`.
    fn decode(&self, kind: RecordKind, subject: &Subject, data: &[u8])
        -> Result<Record, DecodeError>;
}

/// Subordinate address deriver - outbound port.
#[async_trait]
pub trait AddressDeriver: Send + Sync {
    /// Resolve the subordinate address of `owner` under `base`.
    ///
    /// Fails with [`SyncError::Derivation`].
    async fn derive(
        &self,
        base: Subject,
        owner: Subject,
        allow_off_curve: bool,
    ) -> Result<Subject, SyncError>;
}
