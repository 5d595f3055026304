//! Chunk extraction handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use ytchunk_models::{ChunkJob, ChunkRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Raw query of `/youtubechunk-to-s3`.
///
/// Offsets are kept as strings so that malformed numbers surface as a
/// validation error instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ChunkQuery {
    pub url: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ChunkQuery {
    pub fn into_request(self) -> ApiResult<ChunkRequest> {
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ApiError::validation("missing url"))?;

        Ok(ChunkRequest {
            url,
            start: parse_offset("start", self.start)?,
            end: parse_offset("end", self.end)?,
        })
    }
}

fn parse_offset(name: &str, raw: Option<String>) -> ApiResult<f64> {
    let raw = raw.ok_or_else(|| ApiError::validation(format!("missing {}", name)))?;
    raw.trim()
        .parse()
        .map_err(|_| ApiError::validation(format!("{} is not a number: {:?}", name, raw)))
}

#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub fileurl: String,
}

#[derive(Debug, Serialize)]
pub struct UploadUrlResponse {
    pub url: String,
}

/// Liveness text of the root route.
pub async fn root() -> &'static str {
    "server ok"
}

/// Issue a presigned upload URL.
pub async fn upload_url(State(state): State<AppState>) -> ApiResult<Json<UploadUrlResponse>> {
    let target = state.write_targets.request_write_target().await?;
    Ok(Json(UploadUrlResponse { url: target.url }))
}

/// Extract a chunk of a remote video and upload it.
pub async fn chunk_to_storage(
    State(state): State<AppState>,
    Query(query): Query<ChunkQuery>,
) -> ApiResult<Json<ChunkResponse>> {
    let request = query.into_request()?;
    let range = request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let job = ChunkJob::new(
        request.url,
        range.start_secs,
        range.end_secs,
        &state.pipeline.config().temp_dir,
    )
    .map_err(|e| ApiError::validation(e.to_string()))?;

    info!(
        job_id = %job.id,
        start = range.start_secs,
        end = range.end_secs,
        "Accepted chunk request"
    );

    let reference = state.pipeline.run(job).await?;

    Ok(Json(ChunkResponse {
        fileurl: reference.into_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: Option<&str>, start: Option<&str>, end: Option<&str>) -> ChunkQuery {
        ChunkQuery {
            url: url.map(String::from),
            start: start.map(String::from),
            end: end.map(String::from),
        }
    }

    #[test]
    fn test_query_parses_fractional_offsets() {
        let request = query(Some("https://youtu.be/abc"), Some("10.4"), Some(" 19.6 "))
            .into_request()
            .unwrap();
        assert_eq!(request.start, 10.4);
        assert_eq!(request.end, 19.6);

        let range = request.validate().unwrap();
        assert_eq!((range.start_secs, range.end_secs), (10, 20));
    }

    #[test]
    fn test_query_rejects_missing_or_malformed_values() {
        assert!(query(None, Some("1"), Some("2")).into_request().is_err());
        assert!(query(Some(" "), Some("1"), Some("2")).into_request().is_err());
        assert!(query(Some("https://youtu.be/abc"), None, Some("2"))
            .into_request()
            .is_err());
        assert!(query(Some("https://youtu.be/abc"), Some("ten"), Some("20"))
            .into_request()
            .is_err());
    }
}
