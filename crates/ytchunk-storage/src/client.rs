//! S3 write-target issuer.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Content type of every uploaded chunk.
pub const CHUNK_CONTENT_TYPE: &str = "video/mp4";

/// Default validity of a write target.
pub const DEFAULT_WRITE_TARGET_TTL: Duration = Duration::from_secs(3600);

/// A time-limited URL the holder may `PUT` one object to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    /// Signed URL, including its query string
    pub url: String,
    /// Object key
    pub key: String,
    /// How long the URL stays valid
    pub expires_in: Duration,
}

/// Issues write targets on the storage sink.
#[async_trait]
pub trait WriteTargetIssuer: Send + Sync {
    async fn request_write_target(&self) -> StorageResult<WriteTarget>;
}

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name
    pub bucket_name: String,
    /// Region
    pub region: String,
    /// Access key ID; falls back to the default provider chain when unset
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// Custom endpoint (S3-compatible stores)
    pub endpoint_url: Option<String>,
    /// Validity of issued write targets
    pub write_target_ttl: Duration,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let write_target_ttl = std::env::var("S3_UPLOAD_URL_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_WRITE_TARGET_TTL);

        Ok(Self {
            bucket_name: std::env::var("S3_BUCKET")
                .map_err(|_| StorageError::config_error("S3_BUCKET not set"))?,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: non_empty_env("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_env("AWS_SECRET_ACCESS_KEY"),
            endpoint_url: non_empty_env("S3_ENDPOINT_URL"),
            write_target_ttl,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Issues presigned S3 `PUT` URLs for chunk uploads.
#[derive(Clone)]
pub struct S3WriteTargets {
    client: Client,
    bucket: String,
    ttl: Duration,
}

impl S3WriteTargets {
    /// Create a new issuer from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) => Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(id, secret, None, None, "env")),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket_name,
            ttl: config.write_target_ttl,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        Self::new(S3Config::from_env()?).await
    }

    /// Presign a `PUT` for `key`.
    pub async fn presign_put(&self, key: &str) -> StorageResult<String> {
        let presign_config =
            PresigningConfig::expires_in(self.ttl).map_err(|e| StorageError::presign_failed(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(CHUNK_CONTENT_TYPE)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::presign_failed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

#[async_trait]
impl WriteTargetIssuer for S3WriteTargets {
    async fn request_write_target(&self) -> StorageResult<WriteTarget> {
        let key = chunk_key();
        let url = self.presign_put(&key).await?;
        debug!(key = %key, bucket = %self.bucket, "Issued write target");

        Ok(WriteTarget {
            url,
            key,
            expires_in: self.ttl,
        })
    }
}

/// Random object key: 32 hex characters plus `.mp4`.
pub fn chunk_key() -> String {
    format!("{}.mp4", Uuid::new_v4().simple())
}
