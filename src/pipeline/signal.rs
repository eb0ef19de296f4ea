//! Run-scoped signals shared by the reader and parser stages
//!
//! Every run gets its own [`RunContext`]; nothing here is process-global.

use crate::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

/// Pipeline stage, used to label failures in logs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Archive stream reader (producer)
    Reader,
    /// Record parser (consumer)
    Parser,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Reader => f.write_str("reader"),
            Stage::Parser => f.write_str("parser"),
        }
    }
}

/// Single-fire latch raised when the parser drains its input without error.
///
/// Firing twice is a no-op; only the first call returns `true`.
#[derive(Clone, Debug, Default)]
pub struct CompletionSignal {
    inner: Arc<CompletionInner>,
}

#[derive(Debug, Default)]
struct CompletionInner {
    fired: AtomicBool,
    notify: Notify,
}

impl CompletionSignal {
    /// Create an unfired signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        let first = self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Whether the signal has fired
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal fires (returns immediately if it already has)
    pub async fn fired(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent fire() cannot slip between.
            notified.as_mut().enable();
            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle a stage uses to report its (single) fatal error.
///
/// Reporting never blocks: the channel holds one slot per stage, and a send that
/// still finds it full or closed is logged and dropped since the run has already
/// terminated.
#[derive(Clone, Debug)]
pub struct FailureReporter {
    tx: mpsc::Sender<Error>,
    token: CancellationToken,
}

impl FailureReporter {
    /// Record `error` for the coordinator, then cancel the run.
    pub fn fail(&self, stage: Stage, error: Error) {
        tracing::debug!(%stage, kind = error.kind(), error = %error, "stage failed");
        if let Err(e) = self.tx.try_send(error) {
            tracing::debug!(%stage, error = %e, "failure not delivered, run already terminated");
        }
        self.token.cancel();
    }
}

/// Primitives shared by both stages of one run
#[derive(Clone, Debug)]
pub struct RunContext {
    /// Cancellation token; cancelling is idempotent
    pub token: CancellationToken,
    /// Completion latch, fired by the parser only
    pub completion: CompletionSignal,
    /// Failure reporting handle
    pub failures: FailureReporter,
}

/// Number of stages that may each report one failure
pub(crate) const FAILURE_SLOTS: usize = 2;

impl RunContext {
    /// Fresh token, signal and failure channel for a new run.
    ///
    /// The receiver goes to the coordinator; the context is cloned into each stage.
    pub fn new() -> (Self, mpsc::Receiver<Error>) {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(FAILURE_SLOTS);
        let ctx = Self {
            failures: FailureReporter {
                tx,
                token: token.clone(),
            },
            token,
            completion: CompletionSignal::new(),
        };
        (ctx, rx)
    }

    /// Whether a stage has failed (or the run was otherwise cancelled)
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
