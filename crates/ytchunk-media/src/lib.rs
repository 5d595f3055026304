//! Media plumbing for chunk extraction.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - A streaming transcode worker with an event channel and stop handle
//! - Source fetching through yt-dlp with injected credentials

pub mod command;
pub mod error;
pub mod progress;
pub mod source;
pub mod transcode;

pub use command::{check_ffmpeg, check_ytdlp, FfmpegCommand};
pub use error::{MediaError, MediaResult};
pub use progress::FfmpegProgress;
pub use source::{
    ByteStream, FetchedSource, SourceCredentials, SourceFetcher, SourceMetadata, YtDlpFetcher,
};
pub use transcode::{
    byte_stream, FfmpegTranscoder, TranscodeSession, TranscodeSpec, Transcoder, WorkerEvent,
    WorkerStopper,
};
