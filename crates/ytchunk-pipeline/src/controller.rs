//! Pipeline controller.
//!
//! Runs one chunk job end to end:
//! 1. Fetch the source (bounded metadata lookup, then a byte stream)
//! 2. Feed the stream into a transcode worker
//! 3. Race natural completion, worker errors and the watchdog to a single
//!    resolution, stopping the worker early once the requested end is reached
//! 4. Salvage partial output when the worker did not finish cleanly
//! 5. Upload, then remove the artifact on every path

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};
use ytchunk_media::{
    ByteStream, MediaError, SourceFetcher, TranscodeSession, TranscodeSpec, Transcoder,
    WorkerEvent, WorkerStopper,
};
use ytchunk_models::{ChunkJob, DurableReference, JobLifecycle, JobState};
use ytchunk_storage::UploadHandoff;

use crate::artifact::Artifact;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::guard::{ResolutionGuard, TerminationReason, Trigger};
use crate::logging::JobLogger;
use crate::metrics;
use crate::salvage;
use crate::watchdog::{self, WatchdogConfig};

/// Bounded chunk extraction pipeline.
pub struct ChunkPipeline {
    config: PipelineConfig,
    fetcher: Arc<dyn SourceFetcher>,
    transcoder: Arc<dyn Transcoder>,
    upload: UploadHandoff,
}

impl ChunkPipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn SourceFetcher>,
        transcoder: Arc<dyn Transcoder>,
        upload: UploadHandoff,
    ) -> Self {
        Self {
            config,
            fetcher,
            transcoder,
            upload,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a job to completion and return the durable reference of its upload.
    ///
    /// The artifact never outlives this call, even if the returned future is
    /// dropped before it resolves.
    pub async fn run(&self, job: ChunkJob) -> PipelineResult<DurableReference> {
        let logger = JobLogger::new(&job.id, "chunk");
        let span = logger.create_span();
        self.run_job(job, logger).instrument(span).await
    }

    async fn run_job(&self, job: ChunkJob, logger: JobLogger) -> PipelineResult<DurableReference> {
        let started = Instant::now();
        let mut artifact = Artifact::new(&job.artifact_path);
        let mut lifecycle = TrackedLifecycle::new(&logger);

        logger.log_start(&format!(
            "{} [{}s, {}s)",
            job.source_url, job.start_secs, job.end_secs
        ));

        let result = self.execute(&job, &mut lifecycle, &logger).await;

        if let Err(e) = artifact.cleanup().await {
            logger.log_warning(&e.to_string());
            metrics::record_cleanup_failure();
        }
        lifecycle.advance(JobState::Cleaned);

        let outcome = match (&result, lifecycle.resolution()) {
            (Ok(_), Some(JobState::PartiallyCompleted)) => "partial",
            (Ok(_), _) => "completed",
            (Err(e), _) => e.kind(),
        };
        metrics::record_job(outcome, started.elapsed().as_secs_f64());

        match &result {
            Ok(reference) => logger.log_completion(&format!("{} ({})", reference, outcome)),
            Err(e) => logger.log_error(&e.to_string()),
        }

        result
    }

    async fn execute(
        &self,
        job: &ChunkJob,
        lifecycle: &mut TrackedLifecycle<'_>,
        logger: &JobLogger,
    ) -> PipelineResult<DurableReference> {
        lifecycle.advance(JobState::Fetching);
        let input = match self.fetch(job, logger).await {
            Ok(input) => input,
            Err(e) => {
                lifecycle.advance(JobState::Failed);
                return Err(e);
            }
        };

        lifecycle.advance(JobState::Transcoding);
        match self.transcode(job, input, logger).await {
            Ok(resolution) => lifecycle.advance(resolution),
            Err(e) => {
                lifecycle.advance(JobState::Failed);
                return Err(e);
            }
        }

        lifecycle.advance(JobState::Uploading);
        let upload_started = Instant::now();
        match self.upload.upload(&job.artifact_path).await {
            Ok(reference) => {
                metrics::record_upload(true, upload_started.elapsed().as_secs_f64());
                lifecycle.advance(JobState::Uploaded);
                Ok(reference)
            }
            Err(e) => {
                metrics::record_upload(false, upload_started.elapsed().as_secs_f64());
                lifecycle.advance(JobState::UploadFailed);
                Err(PipelineError::Upload(e))
            }
        }
    }

    async fn fetch(&self, job: &ChunkJob, logger: &JobLogger) -> PipelineResult<ByteStream> {
        if let Some(dir) = job.artifact_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PipelineError::Worker(MediaError::Io(e)))?;
        }

        let timeout = self.config.fetch_timeout;
        let source = tokio::time::timeout(timeout, self.fetcher.fetch(&job.source_url))
            .await
            .map_err(|_| PipelineError::Fetch(MediaError::Timeout(timeout.as_secs())))?
            .map_err(PipelineError::Fetch)?;

        if let Some(total) = source.metadata.duration {
            if job.start_secs as f64 >= total {
                logger.log_warning(&format!(
                    "start offset {}s is past the source duration {:.1}s",
                    job.start_secs, total
                ));
            }
        }
        logger.log_progress(&format!("fetched \"{}\"", source.metadata.title));

        Ok(source.stream)
    }

    /// Drive the worker to a single resolution and decide whether the
    /// artifact is deliverable.
    async fn transcode(
        &self,
        job: &ChunkJob,
        input: ByteStream,
        logger: &JobLogger,
    ) -> PipelineResult<JobState> {
        let spec = TranscodeSpec::new(job.start_secs, job.duration_secs(), &job.artifact_path);
        let TranscodeSession {
            mut events,
            stopper,
        } = self
            .transcoder
            .spawn(input, &spec)
            .await
            .map_err(PipelineError::Worker)?;

        let cancel = CancellationToken::new();
        let (guard, mut resolved) = ResolutionGuard::new(cancel.clone());
        let (progress_tx, progress_rx) = watch::channel(0.0);

        let watchdog_config = WatchdogConfig {
            deadline: self.config.deadline_for(job.duration()),
            stall_interval: self.config.stall_interval,
            stall_samples: self.config.stall_samples,
        };
        debug!(
            deadline_secs = watchdog_config.deadline.as_secs(),
            "Armed watchdog"
        );
        let watchdog = watchdog::run(watchdog_config, progress_rx, &guard, cancel);
        tokio::pin!(watchdog);
        let mut watchdog_done = false;

        let mut tracker = ProgressTracker {
            guard: &guard,
            stopper: &stopper,
            progress: progress_tx,
            // Absolute mark compared against output-relative progress, so this
            // only trips early when start is under the tolerance.
            end_mark: job.end_secs as f64 - self.config.end_tolerance.as_secs_f64(),
            position: 0.0,
        };

        let trigger = loop {
            tokio::select! {
                biased;
                trigger = &mut resolved => {
                    break trigger.unwrap_or_else(|_| Trigger::WorkerFailed {
                        message: "resolution channel closed".to_string(),
                        exit_code: None,
                    });
                }
                _ = &mut watchdog, if !watchdog_done => watchdog_done = true,
                event = events.recv() => tracker.on_event(event),
            }
        };

        if let Trigger::Forced(reason) = &trigger {
            metrics::record_termination(reason.as_str());
            logger.log_warning(&format!(
                "stopping worker at {:.2}s ({})",
                tracker.position, reason
            ));
            stopper.stop();
        }
        self.await_exit(&mut events, logger).await;
        stopper.stop();

        let path = job.artifact_path.as_path();
        match trigger {
            Trigger::Completed => Ok(JobState::Completed),
            Trigger::WorkerFailed { message, exit_code } => {
                if salvage::is_usable(path).await {
                    logger.log_warning(&format!("salvaging partial output after: {}", message));
                    Ok(JobState::PartiallyCompleted)
                } else {
                    Err(PipelineError::worker_failed(message, exit_code))
                }
            }
            Trigger::Forced(reason) => {
                if salvage::is_usable(path).await {
                    Ok(JobState::PartiallyCompleted)
                } else {
                    Err(PipelineError::Timeout { reason })
                }
            }
        }
    }

    /// Wait for the worker's event stream to close so the artifact is stable.
    async fn await_exit(&self, events: &mut mpsc::Receiver<WorkerEvent>, logger: &JobLogger) {
        let drain = async {
            while let Some(event) = events.recv().await {
                debug!(?event, "Event after resolution");
            }
        };
        if tokio::time::timeout(self.config.exit_grace, drain).await.is_err() {
            logger.log_warning("worker did not exit within the grace period");
        }
    }
}

/// Applies worker events to the resolution guard.
struct ProgressTracker<'a> {
    guard: &'a ResolutionGuard,
    stopper: &'a WorkerStopper,
    progress: watch::Sender<f64>,
    end_mark: f64,
    position: f64,
}

impl ProgressTracker<'_> {
    fn on_event(&mut self, event: Option<WorkerEvent>) {
        match event {
            Some(WorkerEvent::Started { cmdline }) => debug!(%cmdline, "Worker started"),
            Some(WorkerEvent::Progress {
                timemark,
                position_secs,
            }) => {
                // Regressions are ignored
                if position_secs > self.position {
                    self.position = position_secs;
                    self.progress.send_replace(position_secs);
                }
                debug!(%timemark, position = self.position, "Worker progress");

                if self.position >= self.end_mark
                    && self.guard.fire(Trigger::Forced(TerminationReason::EndReached))
                {
                    self.stopper.stop();
                }
            }
            Some(WorkerEvent::Error { message, exit_code }) => {
                self.guard.fire(Trigger::WorkerFailed { message, exit_code });
            }
            Some(WorkerEvent::End) => {
                self.guard.fire(Trigger::Completed);
            }
            None => {
                self.guard.fire(Trigger::WorkerFailed {
                    message: "worker exited without reporting a result".to_string(),
                    exit_code: None,
                });
            }
        }
    }
}

/// Lifecycle that logs every transition.
struct TrackedLifecycle<'a> {
    lifecycle: JobLifecycle,
    logger: &'a JobLogger,
}

impl<'a> TrackedLifecycle<'a> {
    fn new(logger: &'a JobLogger) -> Self {
        Self {
            lifecycle: JobLifecycle::new(),
            logger,
        }
    }

    fn advance(&mut self, next: JobState) {
        let from = self.lifecycle.current();
        match self.lifecycle.advance(next) {
            Ok(_) => self.logger.log_transition(from, next),
            Err(e) => self.logger.log_warning(&e.to_string()),
        }
    }

    fn resolution(&self) -> Option<JobState> {
        self.lifecycle.resolution()
    }
}
