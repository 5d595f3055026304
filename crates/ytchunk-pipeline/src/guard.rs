//! Single-resolution guard.
//!
//! Natural completion, worker errors and forced terminations all race to
//! resolve a job. The first [`ResolutionGuard::fire`] wins: it delivers its
//! trigger on a oneshot channel and cancels the watchdog. Every later call
//! is a no-op returning `false`.

use std::fmt;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Why a worker was forcefully terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// The job deadline elapsed
    Deadline,
    /// Progress stopped moving
    Stalled,
    /// Progress reached the end of the requested range
    EndReached,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Deadline => "deadline",
            TerminationReason::Stalled => "stalled",
            TerminationReason::EndReached => "end_reached",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The event that resolved a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// The worker exited cleanly
    Completed,
    /// The worker reported an error
    WorkerFailed {
        message: String,
        exit_code: Option<i32>,
    },
    /// The pipeline stopped the worker
    Forced(TerminationReason),
}

/// Commit-once completion channel for a job.
#[derive(Debug)]
pub struct ResolutionGuard {
    tx: Mutex<Option<oneshot::Sender<Trigger>>>,
    cancel: CancellationToken,
}

impl ResolutionGuard {
    /// Create a guard. `cancel` is cancelled by the winning trigger.
    pub fn new(cancel: CancellationToken) -> (Self, oneshot::Receiver<Trigger>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
                cancel,
            },
            rx,
        )
    }

    /// Resolve the job with `trigger`.
    ///
    /// Returns `true` only for the first caller.
    pub fn fire(&self, trigger: Trigger) -> bool {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match sender {
            Some(tx) => {
                self.cancel.cancel();
                // The receiver may already be gone if the job was dropped
                let _ = tx.send(trigger);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}
