//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;
use ytchunk_media::MediaError;
use ytchunk_storage::StorageError;

use crate::guard::TerminationReason;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Why a job failed. Exactly one of these surfaces per failed job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Metadata lookup or stream acquisition failed (including the lookup timeout)
    #[error("Source fetch failed: {0}")]
    Fetch(#[source] MediaError),

    /// Transcoding failed without leaving a usable artifact
    #[error("Transcode failed: {0}")]
    Worker(#[source] MediaError),

    /// The worker was terminated and left no usable artifact
    #[error("Chunk timed out ({reason}) with no usable output")]
    Timeout { reason: TerminationReason },

    /// Transfer to the storage sink failed
    #[error("Upload failed: {0}")]
    Upload(#[from] StorageError),
}

impl PipelineError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Worker(_) => "worker",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::Upload(_) => "upload",
        }
    }

    pub fn worker_failed(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::Worker(MediaError::ffmpeg_failed(message, None, exit_code))
    }
}

/// Failure to remove an artifact. Logged, never propagated.
#[derive(Debug, Error)]
#[error("Failed to remove artifact {}: {source}", path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
