//! Deadline timer and stall detector.
//!
//! Both run in one task and report through the job's [`ResolutionGuard`]
//! with a [`TerminationReason`].

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::guard::{ResolutionGuard, TerminationReason, Trigger};

/// Stand-in for deadlines too far out to represent as an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Watchdog timings for one job.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    pub deadline: Duration,
    pub stall_interval: Duration,
    pub stall_samples: u32,
}

/// Flags a progress marker that has stopped moving.
#[derive(Debug, Clone)]
pub struct StallDetector {
    threshold: u32,
    last: Option<f64>,
    identical: u32,
}

impl StallDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            last: None,
            identical: 0,
        }
    }

    /// Record a sample. Returns `true` once the marker has been identical
    /// for `threshold` consecutive samples, counting the first one.
    pub fn observe(&mut self, marker: f64) -> bool {
        match self.last {
            Some(previous) if previous == marker => self.identical += 1,
            _ => {
                self.last = Some(marker);
                self.identical = 1;
            }
        }
        self.identical >= self.threshold
    }

    /// Consecutive identical samples seen so far.
    pub fn identical_samples(&self) -> u32 {
        self.identical
    }
}

/// Run the watchdog until it fires or `cancel` is triggered.
///
/// Returns the reason when this watchdog resolved the job.
pub async fn run(
    config: WatchdogConfig,
    progress: watch::Receiver<f64>,
    guard: &ResolutionGuard,
    cancel: CancellationToken,
) -> Option<TerminationReason> {
    let start = Instant::now();
    let deadline_at = start
        .checked_add(config.deadline)
        .unwrap_or_else(|| start + FAR_FUTURE);
    let deadline = tokio::time::sleep_until(deadline_at);
    tokio::pin!(deadline);

    let mut sampler = interval_at(start + config.stall_interval, config.stall_interval);
    sampler.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stall = StallDetector::new(config.stall_samples);

    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = &mut deadline => break TerminationReason::Deadline,
            _ = sampler.tick() => {
                let marker = *progress.borrow();
                if stall.observe(marker) {
                    break TerminationReason::Stalled;
                }
                debug!(marker, identical = stall.identical_samples(), "Progress sample");
            }
        }
    };

    guard.fire(Trigger::Forced(reason)).then_some(reason)
}
