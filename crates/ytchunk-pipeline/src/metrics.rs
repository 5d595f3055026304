//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the binary decides whether a
//! Prometheus recorder is installed.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "ytchunk_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "ytchunk_job_duration_seconds";
    pub const TERMINATIONS_TOTAL: &str = "ytchunk_terminations_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "ytchunk_upload_duration_seconds";
    pub const CLEANUP_FAILURES_TOTAL: &str = "ytchunk_cleanup_failures_total";
}

/// Record a finished job. `outcome` is `completed`, `partial` or an error kind.
pub fn record_job(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a forced termination.
pub fn record_termination(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::TERMINATIONS_TOTAL, &labels).increment(1);
}

/// Record an upload attempt.
pub fn record_upload(success: bool, duration_secs: f64) {
    let labels = [("success", success.to_string())];
    histogram!(names::UPLOAD_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}
