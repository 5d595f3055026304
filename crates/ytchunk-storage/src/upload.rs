//! Artifact upload handoff.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};
use ytchunk_models::DurableReference;

use crate::client::{WriteTargetIssuer, CHUNK_CONTENT_TYPE};
use crate::error::{StorageError, StorageResult};

/// Default timeout for a single upload transfer.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Transfers a finished artifact to the storage sink.
#[derive(Clone)]
pub struct UploadHandoff {
    issuer: Arc<dyn WriteTargetIssuer>,
    http: reqwest::Client,
}

impl UploadHandoff {
    pub fn new(issuer: Arc<dyn WriteTargetIssuer>, timeout: Duration) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::config_error(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { issuer, http })
    }

    /// Upload the artifact at `path` with a single `PUT`.
    ///
    /// Returns the write target URL without its query string and fragment.
    pub async fn upload(&self, path: impl AsRef<Path>) -> StorageResult<DurableReference> {
        let path = path.as_ref();
        let target = self.issuer.request_write_target().await?;

        // Presigned PUTs need a Content-Length, so the body is sent whole
        let body = tokio::fs::read(path).await?;
        let size = body.len();
        debug!(key = %target.key, size, "Uploading {}", path.display());

        let response = self
            .http
            .put(&target.url)
            .header(CONTENT_TYPE, CHUNK_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(key = %target.key, status = status.as_u16(), "Upload rejected");
            return Err(StorageError::UploadRejected {
                status: status.as_u16(),
            });
        }

        let reference = DurableReference::from_signed_url(&target.url);
        info!(key = %target.key, size, "Uploaded {} to {}", path.display(), reference);
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WriteTarget;
    use async_trait::async_trait;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedTarget(String);

    #[async_trait]
    impl WriteTargetIssuer for FixedTarget {
        async fn request_write_target(&self) -> StorageResult<WriteTarget> {
            Ok(WriteTarget {
                url: self.0.clone(),
                key: "abc.mp4".to_string(),
                expires_in: Duration::from_secs(3600),
            })
        }
    }

    fn handoff(url: String) -> UploadHandoff {
        UploadHandoff::new(Arc::new(FixedTarget(url)), Duration::from_secs(5)).unwrap()
    }

    fn artifact(bytes: &[u8]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), bytes).unwrap();
        file
    }

    #[tokio::test]
    async fn test_upload_returns_reference_without_query() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/chunks/abc.mp4"))
            .and(header("content-type", "video/mp4"))
            .and(body_bytes(b"fragmented mp4".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let file = artifact(b"fragmented mp4");
        let url = format!("{}/chunks/abc.mp4?X-Amz-Signature=deadbeef", server.uri());
        let reference = handoff(url).upload(file.path()).await.unwrap();

        assert_eq!(reference.as_str(), format!("{}/chunks/abc.mp4", server.uri()));
        assert!(!reference.as_str().contains('?'));
    }

    #[tokio::test]
    async fn test_upload_rejected_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let file = artifact(b"data");
        let url = format!("{}/chunks/abc.mp4?sig=1", server.uri());
        let err = handoff(url).upload(file.path()).await.unwrap_err();

        assert!(matches!(err, StorageError::UploadRejected { status: 403 }));
    }

    #[tokio::test]
    async fn test_upload_missing_artifact() {
        let err = handoff("http://127.0.0.1:9/never".to_string())
            .upload("/nonexistent/artifact.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[tokio::test]
    async fn test_upload_transport_error() {
        let file = artifact(b"data");
        // Port 9 (discard) is closed on test hosts
        let err = handoff("http://127.0.0.1:9/chunks/abc.mp4".to_string())
            .upload(file.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
    }
}
