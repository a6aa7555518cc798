//! # Cancelable Operations
//!
//! A single async operation raced against an explicit cancellation token.
//!
//! ## Guarantee
//!
//! Once `cancel()` has returned, the completion continuation of the
//! operation will never run, even if the wrapped future has already
//! produced its output. The continuation executes under the same gate
//! that `cancel()` takes, so the two can never interleave.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Outcome of an operation that was superseded.
///
/// Never surfaced to callers; it only tells a task to stay silent.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("operation canceled")]
pub struct Canceled;

struct TokenInner {
    flag: watch::Sender<bool>,
    /// Set once a continuation has run.
    gate: Mutex<bool>,
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. Cancellation is one-way.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Create an uncanceled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                flag: watch::Sender::new(false),
                gate: Mutex::new(false),
            }),
        }
    }

    /// Cancel the token.
    ///
    /// Returns `true` only for the call that flipped the flag, and only if
    /// no continuation had run by then.
    pub fn cancel(&self) -> bool {
        let delivered = self.inner.gate.lock();
        let flipped = !self.inner.flag.send_replace(true);
        flipped && !*delivered
    }

    /// Whether the token has been canceled.
    pub fn is_canceled(&self) -> bool {
        *self.inner.flag.borrow()
    }

    /// Resolve once the token is canceled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.flag.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|canceled| *canceled).await;
    }

    /// Race `future` against cancellation.
    ///
    /// A canceled race drops `future` without polling it again.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Canceled> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Canceled),
            output = future => Ok(output),
        }
    }

    /// Run `f` only if the token is still live, holding the cancellation
    /// gate for the whole call.
    ///
    /// `f` must not cancel this token.
    pub fn complete_with<R>(&self, f: impl FnOnce() -> R) -> Result<R, Canceled> {
        let mut delivered = self.inner.gate.lock();
        if *self.inner.flag.borrow() {
            return Err(Canceled);
        }
        *delivered = true;
        Ok(f())
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// A spawned operation whose continuation can be suppressed.
///
/// Dropping the handle cancels the operation.
#[derive(Debug)]
pub struct CancelableOperation {
    token: CancelToken,
    task: JoinHandle<()>,
}

impl CancelableOperation {
    /// Spawn `future`; hand its output to `on_complete` unless canceled first.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start<F, C>(future: F, on_complete: C) -> Self
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        C: FnOnce(F::Output) + Send + 'static,
    {
        let token = CancelToken::new();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let delivered = match task_token.run(future).await {
                Ok(output) => task_token.complete_with(move || on_complete(output)),
                Err(canceled) => Err(canceled),
            };
            if delivered.is_err() {
                tracing::trace!("cancelable operation superseded");
            }
        });
        Self { token, task }
    }

    /// Suppress the continuation and drop the pending future.
    ///
    /// Idempotent; returns `true` only for the first effective call.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    /// Whether `cancel()` has been called.
    pub fn is_canceled(&self) -> bool {
        self.token.is_canceled()
    }

    /// Whether the spawned task has run to completion.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CancelableOperation {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
