//! Streaming transcode worker.
//!
//! A [`Transcoder`] consumes a byte stream, trims it to the requested
//! range and writes a fragmented MP4. The running child is observed
//! through a channel of [`WorkerEvent`]s and torn down with a
//! [`WorkerStopper`].

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{check_ffmpeg, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};
use crate::source::ByteStream;

/// Capacity of the worker event channel.
const EVENT_BUFFER: usize = 64;

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 5;

/// Fixed output profile for a chunk.
#[derive(Debug, Clone)]
pub struct TranscodeSpec {
    /// Seek position in whole seconds
    pub start_secs: u64,
    /// Output duration in whole seconds
    pub duration_secs: u64,
    /// Output artifact path
    pub output: PathBuf,
}

impl TranscodeSpec {
    pub fn new(start_secs: u64, duration_secs: u64, output: impl AsRef<Path>) -> Self {
        Self {
            start_secs,
            duration_secs,
            output: output.as_ref().to_path_buf(),
        }
    }

    /// Build the FFmpeg command: MP4 on stdin, video copied, audio to AAC,
    /// fragmented streamable output.
    pub fn to_command(&self) -> FfmpegCommand {
        FfmpegCommand::from_stdin(&self.output)
            .input_format("mp4")
            .output_seek(self.start_secs)
            .duration(self.duration_secs)
            .video_codec("copy")
            .audio_codec("aac")
            .movflags("frag_keyframe+empty_moov")
    }
}

/// Events emitted by a running transcode.
///
/// A session emits `Started`, any number of `Progress` events, then exactly
/// one of `Error` or `End`.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Started {
        cmdline: String,
    },
    Progress {
        /// Raw timemark as reported by the worker
        timemark: String,
        /// Timemark converted to seconds
        position_secs: f64,
    },
    Error {
        message: String,
        exit_code: Option<i32>,
    },
    End,
}

/// Handle for forcefully stopping a worker.
///
/// Stopping is idempotent and remains valid after the worker has exited.
/// Dropping every clone also stops the worker.
#[derive(Debug, Clone)]
pub struct WorkerStopper {
    tx: Arc<watch::Sender<bool>>,
}

impl WorkerStopper {
    /// Create a stopper and the receiver the worker listens on.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A running transcode.
pub struct TranscodeSession {
    pub events: mpsc::Receiver<WorkerEvent>,
    pub stopper: WorkerStopper,
}

impl TranscodeSession {
    /// Create a session along with the sending half of its event channel.
    ///
    /// Used by [`Transcoder`] implementations to wire up their own workers.
    pub fn channel() -> (Self, mpsc::Sender<WorkerEvent>, watch::Receiver<bool>) {
        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (stopper, stop_rx) = WorkerStopper::new();
        (Self { events, stopper }, events_tx, stop_rx)
    }
}

/// Spawns transcode workers.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Start transcoding `input` according to `spec`.
    async fn spawn(&self, input: ByteStream, spec: &TranscodeSpec) -> MediaResult<TranscodeSession>;
}

/// Transcoder backed by an `ffmpeg` child process.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn spawn(&self, input: ByteStream, spec: &TranscodeSpec) -> MediaResult<TranscodeSession> {
        let ffmpeg = check_ffmpeg()?;

        let cmd = spec.to_command();
        let cmdline = cmd.cmdline();
        debug!("Running FFmpeg: {}", cmdline);

        let mut child = Command::new(ffmpeg)
            .args(cmd.build_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdin not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;

        let (session, events_tx, stop_rx) = TranscodeSession::channel();
        let _ = events_tx.send(WorkerEvent::Started { cmdline }).await;

        let pump = tokio::spawn(pump_input(input, stdin));
        tokio::spawn(supervise(child, stderr, pump, events_tx, stop_rx));

        Ok(session)
    }
}

/// Copy the source stream into the child's stdin.
async fn pump_input(mut input: ByteStream, mut stdin: ChildStdin) {
    match tokio::io::copy(&mut input, &mut stdin).await {
        Ok(bytes) => debug!(bytes, "Source stream exhausted"),
        // The worker exits (or is stopped) before consuming everything
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!("Worker closed stdin: {}", e)
        }
        Err(e) => warn!("Source stream failed: {}", e),
    }
    let _ = stdin.shutdown().await;
}

/// Wait for the child to exit or for a stop request, then emit the
/// terminal event once all progress has been forwarded.
async fn supervise(
    mut child: Child,
    stderr: ChildStderr,
    pump: JoinHandle<()>,
    events_tx: mpsc::Sender<WorkerEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let reader = tokio::spawn(forward_progress(stderr, events_tx.clone()));

    let status = tokio::select! {
        status = child.wait() => status,
        _ = stop_requested(&mut stop_rx) => {
            info!("Stop requested, killing ffmpeg");
            let _ = child.start_kill();
            child.wait().await
        }
    };

    // Drop the source stream along with whatever process feeds it
    pump.abort();

    let stderr_tail = reader.await.unwrap_or_default();
    let stopped = *stop_rx.borrow();

    let _ = events_tx.send(terminal_event(status, stopped, stderr_tail)).await;
}

fn terminal_event(
    status: std::io::Result<ExitStatus>,
    stopped: bool,
    stderr_tail: Vec<String>,
) -> WorkerEvent {
    match status {
        Ok(status) if status.success() && !stopped => WorkerEvent::End,
        Ok(status) if stopped => WorkerEvent::Error {
            message: "ffmpeg was stopped".to_string(),
            exit_code: status.code(),
        },
        Ok(status) => {
            let detail = if stderr_tail.is_empty() {
                "no error output".to_string()
            } else {
                stderr_tail.join("; ")
            };
            WorkerEvent::Error {
                message: format!("ffmpeg exited with {}: {}", status, detail),
                exit_code: status.code(),
            }
        }
        Err(e) => WorkerEvent::Error {
            message: format!("failed to wait for ffmpeg: {}", e),
            exit_code: None,
        },
    }
}

async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        // Every stopper dropped: the session owner is gone, tear down too
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Forward `-progress` snapshots as events; returns the last non-progress
/// stderr lines for error reporting.
async fn forward_progress(stderr: ChildStderr, events_tx: mpsc::Sender<WorkerEvent>) -> Vec<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut current = FfmpegProgress::default();
    let mut tail: Vec<String> = Vec::new();

    while let Ok(Some(line)) = lines.next_line().await {
        if !is_progress_line(&line) {
            if !line.trim().is_empty() {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line.trim().to_string());
            }
            continue;
        }

        let Some(snapshot) = parse_progress_line(&line, &mut current) else {
            continue;
        };
        if let Some(position_secs) = snapshot.position_secs() {
            let event = WorkerEvent::Progress {
                timemark: snapshot.out_time.clone(),
                position_secs,
            };
            // Receiver gone: keep draining so the child never blocks on stderr
            let _ = events_tx.send(event).await;
        }
    }

    tail
}

/// Read any async source into a [`ByteStream`].
pub fn byte_stream<R>(reader: R) -> ByteStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    Box::new(reader)
}
