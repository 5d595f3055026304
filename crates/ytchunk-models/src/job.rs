//! Chunk extraction job definitions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a job.
///
/// Combines the creation time in milliseconds with a random suffix so
/// concurrently created jobs never share an artifact path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new job ID.
    pub fn new() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", millis, &suffix[..8]))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One extraction request: a `[start, end)` range of a remote source,
/// written to a single artifact file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkJob {
    /// Unique job ID
    pub id: JobId,
    /// Remote source URL
    pub source_url: String,
    /// Start offset in seconds
    pub start_secs: u64,
    /// End offset in seconds (exclusive)
    pub end_secs: u64,
    /// Local output path, unique per job
    pub artifact_path: PathBuf,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ChunkJob {
    /// Create a job writing its artifact into `temp_dir`.
    ///
    /// Fails when the range is empty or inverted.
    pub fn new(
        source_url: impl Into<String>,
        start_secs: u64,
        end_secs: u64,
        temp_dir: impl AsRef<Path>,
    ) -> Result<Self, InvalidRange> {
        if end_secs <= start_secs {
            return Err(InvalidRange {
                start_secs,
                end_secs,
            });
        }

        let id = JobId::new();
        let artifact_path = temp_dir.as_ref().join(format!("{}.mp4", id));

        Ok(Self {
            id,
            source_url: source_url.into(),
            start_secs,
            end_secs,
            artifact_path,
            created_at: Utc::now(),
        })
    }

    /// Length of the requested chunk.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.end_secs - self.start_secs)
    }

    /// Duration in seconds, as passed to the transcoder.
    pub fn duration_secs(&self) -> u64 {
        self.end_secs - self.start_secs
    }
}

/// Range with `end <= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid chunk range: end ({end_secs}s) must be after start ({start_secs}s)")]
pub struct InvalidRange {
    pub start_secs: u64,
    pub end_secs: u64,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Created,
    Fetching,
    Transcoding,
    /// Worker finished naturally
    Completed,
    /// Output salvaged after an error or forced termination
    PartiallyCompleted,
    Failed,
    Uploading,
    Uploaded,
    UploadFailed,
    /// Artifact removed; always the final state
    Cleaned,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Fetching => "fetching",
            JobState::Transcoding => "transcoding",
            JobState::Completed => "completed",
            JobState::PartiallyCompleted => "partially_completed",
            JobState::Failed => "failed",
            JobState::Uploading => "uploading",
            JobState::Uploaded => "uploaded",
            JobState::UploadFailed => "upload_failed",
            JobState::Cleaned => "cleaned",
        }
    }

    /// Whether this is one of the three transcode resolutions.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::PartiallyCompleted | JobState::Failed
        )
    }

    fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Fetching)
                | (Fetching, Transcoding)
                | (Fetching, Failed)
                | (Transcoding, Completed)
                | (Transcoding, PartiallyCompleted)
                | (Transcoding, Failed)
                | (Completed, Uploading)
                | (PartiallyCompleted, Uploading)
                | (Uploading, Uploaded)
                | (Uploading, UploadFailed)
                | (Created, Cleaned)
                | (Fetching, Cleaned)
                | (Transcoding, Cleaned)
                | (Completed, Cleaned)
                | (PartiallyCompleted, Cleaned)
                | (Failed, Cleaned)
                | (Uploading, Cleaned)
                | (Uploaded, Cleaned)
                | (UploadFailed, Cleaned)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid job state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// Tracks a job through its states and rejects illegal transitions.
///
/// The transition table only allows one of `Completed`,
/// `PartiallyCompleted` or `Failed` to be entered, and every state can
/// reach `Cleaned`.
#[derive(Debug, Clone, Default)]
pub struct JobLifecycle {
    current: JobState,
    history: Vec<JobState>,
}

impl JobLifecycle {
    pub fn new() -> Self {
        Self {
            current: JobState::Created,
            history: vec![JobState::Created],
        }
    }

    pub fn current(&self) -> JobState {
        self.current
    }

    /// Every state visited so far, in order.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// The transcode resolution, once reached.
    pub fn resolution(&self) -> Option<JobState> {
        self.history.iter().copied().find(JobState::is_resolution)
    }

    pub fn advance(&mut self, next: JobState) -> Result<JobState, InvalidTransition> {
        if !self.current.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        self.history.push(next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = ChunkJob::new("https://youtube.com/watch?v=abc", 10, 20, "/tmp/chunks").unwrap();

        assert_eq!(job.duration(), Duration::from_secs(10));
        assert_eq!(job.duration_secs(), 10);
        assert!(job.artifact_path.starts_with("/tmp/chunks"));
        assert_eq!(
            job.artifact_path.file_name().unwrap().to_string_lossy(),
            format!("{}.mp4", job.id)
        );
    }

    #[test]
    fn test_job_rejects_empty_range() {
        assert!(ChunkJob::new("u", 20, 20, "/tmp").is_err());
        let err = ChunkJob::new("u", 30, 20, "/tmp").unwrap_err();
        assert_eq!(err.start_secs, 30);
    }

    #[test]
    fn test_job_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| JobId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_lifecycle_success_path() {
        let mut lifecycle = JobLifecycle::new();
        for state in [
            JobState::Fetching,
            JobState::Transcoding,
            JobState::PartiallyCompleted,
            JobState::Uploading,
            JobState::Uploaded,
            JobState::Cleaned,
        ] {
            lifecycle.advance(state).unwrap();
        }
        assert_eq!(lifecycle.current(), JobState::Cleaned);
        assert_eq!(lifecycle.resolution(), Some(JobState::PartiallyCompleted));
    }

    #[test]
    fn test_lifecycle_single_resolution() {
        let mut lifecycle = JobLifecycle::new();
        lifecycle.advance(JobState::Fetching).unwrap();
        lifecycle.advance(JobState::Transcoding).unwrap();
        lifecycle.advance(JobState::Completed).unwrap();

        let err = lifecycle.advance(JobState::Failed).unwrap_err();
        assert_eq!(err.from, JobState::Completed);
        assert_eq!(err.to, JobState::Failed);
    }

    #[test]
    fn test_lifecycle_failure_skips_upload() {
        let mut lifecycle = JobLifecycle::new();
        lifecycle.advance(JobState::Fetching).unwrap();
        lifecycle.advance(JobState::Failed).unwrap();

        assert!(lifecycle.advance(JobState::Uploading).is_err());
        lifecycle.advance(JobState::Cleaned).unwrap();
        assert_eq!(
            lifecycle.history(),
            &[
                JobState::Created,
                JobState::Fetching,
                JobState::Failed,
                JobState::Cleaned
            ]
        );
    }
}
