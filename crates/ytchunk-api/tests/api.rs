//! HTTP surface tests against a router wired with fake collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};
use ytchunk_api::{create_router, ApiConfig, AppState};
use ytchunk_media::{
    byte_stream, ByteStream, MediaError, MediaResult, SourceFetcher, SourceMetadata,
    TranscodeSession, TranscodeSpec, Transcoder, WorkerEvent,
};
use ytchunk_pipeline::{ChunkPipeline, PipelineConfig};
use ytchunk_storage::{
    StorageError, StorageResult, UploadHandoff, WriteTarget, WriteTargetIssuer,
};

struct FakeFetcher {
    fail: bool,
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch_metadata(&self, _source_url: &str) -> MediaResult<SourceMetadata> {
        if self.fail {
            return Err(MediaError::fetch_failed("Sign in to confirm your age"));
        }
        Ok(SourceMetadata {
            id: "abc".to_string(),
            title: "Fixture".to_string(),
            duration: Some(60.0),
        })
    }

    async fn open_stream(&self, _source_url: &str) -> MediaResult<ByteStream> {
        Ok(byte_stream(std::io::Cursor::new(Vec::new())))
    }
}

/// Writes a small artifact and finishes immediately.
struct InstantTranscoder;

#[async_trait]
impl Transcoder for InstantTranscoder {
    async fn spawn(&self, _input: ByteStream, spec: &TranscodeSpec) -> MediaResult<TranscodeSession> {
        tokio::fs::write(&spec.output, b"fragmented mp4").await?;

        let (session, events_tx, _stop_rx) = TranscodeSession::channel();
        tokio::spawn(async move {
            let _ = events_tx.send(WorkerEvent::End).await;
        });
        Ok(session)
    }
}

struct FixedTarget {
    url: Option<String>,
}

#[async_trait]
impl WriteTargetIssuer for FixedTarget {
    async fn request_write_target(&self) -> StorageResult<WriteTarget> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| StorageError::presign_failed("no credentials"))?;
        Ok(WriteTarget {
            url,
            key: "abc.mp4".to_string(),
            expires_in: Duration::from_secs(3600),
        })
    }
}

struct TestApp {
    _dir: tempfile::TempDir,
    router: Router,
}

fn app(fetch_fails: bool, upload_url: Option<String>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let issuer: Arc<dyn WriteTargetIssuer> = Arc::new(FixedTarget { url: upload_url });
    let upload = UploadHandoff::new(issuer.clone(), Duration::from_secs(5)).unwrap();

    let pipeline = ChunkPipeline::new(
        PipelineConfig {
            temp_dir: dir.path().join("chunks"),
            ..Default::default()
        },
        Arc::new(FakeFetcher { fail: fetch_fails }),
        Arc::new(InstantTranscoder),
        upload,
    );

    let state = AppState::new(ApiConfig::default(), Arc::new(pipeline), issuer);
    TestApp {
        _dir: dir,
        router: create_router(state, None),
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("Origin", "https://app.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

const CHUNK_URI: &str =
    "/youtubechunk-to-s3?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc&start=10&end=20";

#[tokio::test]
async fn root_reports_server_ok() {
    let app = app(false, None);
    let (status, _, body) = get(&app.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "server ok");
}

#[tokio::test]
async fn health_reports_version() {
    let app = app(false, None);
    let (status, _, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn upload_url_returns_presigned_url() {
    let app = app(false, Some("https://bucket.s3.amazonaws.com/abc.mp4?X-Amz-Signature=1".into()));
    let (status, _, body) = get(&app.router, "/s3url").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json["url"],
        "https://bucket.s3.amazonaws.com/abc.mp4?X-Amz-Signature=1"
    );
}

#[tokio::test]
async fn upload_url_failure_is_generic() {
    let app = app(false, None);
    let (status, _, body) = get(&app.router, "/s3url").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "An error occurred");
}

#[tokio::test]
async fn chunk_request_returns_durable_reference() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let signed = format!("{}/abc.mp4?X-Amz-Signature=deadbeef", server.uri());
    let app = app(false, Some(signed));
    let (status, _, body) = get(&app.router, CHUNK_URI).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["fileurl"], format!("{}/abc.mp4", server.uri()));
}

#[tokio::test]
async fn pipeline_failure_hides_details() {
    let app = app(true, None);
    let (status, _, body) = get(&app.router, CHUNK_URI).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "An error occurred");
    assert!(!body.contains("age"));
}

#[tokio::test]
async fn invalid_ranges_are_rejected() {
    let app = app(false, None);

    for uri in [
        "/youtubechunk-to-s3?url=https%3A%2F%2Fyoutu.be%2Fabc&start=20&end=10",
        "/youtubechunk-to-s3?url=https%3A%2F%2Fyoutu.be%2Fabc&start=10&end=10.4",
        "/youtubechunk-to-s3?url=https%3A%2F%2Fyoutu.be%2Fabc&start=-5&end=10",
        "/youtubechunk-to-s3?url=https%3A%2F%2Fyoutu.be%2Fabc&start=0&end=1e19",
        "/youtubechunk-to-s3?url=https%3A%2F%2Fyoutu.be%2Fabc&start=abc&end=10",
        "/youtubechunk-to-s3?url=ftp%3A%2F%2Fexample.com%2Fv&start=0&end=10",
        "/youtubechunk-to-s3?start=0&end=10",
    ] {
        let (status, _, body) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body, "Invalid request parameters");
    }
}

#[tokio::test]
async fn responses_carry_cors_and_request_id() {
    let app = app(false, None);
    let (_, headers, _) = get(&app.router, "/").await;

    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert!(headers.get("x-request-id").is_some());
}
