//! Application state.

use std::sync::Arc;

use tracing::{info, warn};
use ytchunk_media::{check_ffmpeg, check_ytdlp, FfmpegTranscoder, SourceCredentials, YtDlpFetcher};
use ytchunk_pipeline::{ChunkPipeline, PipelineConfig};
use ytchunk_storage::{S3WriteTargets, UploadHandoff, WriteTargetIssuer};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<ChunkPipeline>,
    pub write_targets: Arc<dyn WriteTargetIssuer>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        pipeline: Arc<ChunkPipeline>,
        write_targets: Arc<dyn WriteTargetIssuer>,
    ) -> Self {
        Self {
            config,
            pipeline,
            write_targets,
        }
    }

    /// Wire up the production pipeline from environment variables.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let write_targets: Arc<dyn WriteTargetIssuer> = Arc::new(S3WriteTargets::from_env().await?);
        let upload = UploadHandoff::new(write_targets.clone(), config.upload_timeout)?;

        if let Err(e) = check_ffmpeg() {
            warn!("{}; chunk requests will fail until it is installed", e);
        }
        if let Err(e) = check_ytdlp() {
            warn!("{}; chunk requests will fail until it is installed", e);
        }

        let credentials = SourceCredentials::from_env();
        info!(
            cookies = credentials.cookies_file.is_some(),
            user_agent = credentials.user_agent.is_some(),
            "Source credentials loaded"
        );

        let pipeline_config = PipelineConfig::from_env();
        info!(temp_dir = %pipeline_config.temp_dir.display(), "Pipeline config loaded");

        let pipeline = ChunkPipeline::new(
            pipeline_config,
            Arc::new(YtDlpFetcher::new(credentials)),
            Arc::new(FfmpegTranscoder::new()),
            upload,
        );

        Ok(Self::new(config, Arc::new(pipeline), write_targets))
    }
}
