//! Storage sink for finished chunks.
//!
//! This crate provides:
//! - Presigned S3 `PUT` URLs as time-limited write targets
//! - The upload handoff that transfers an artifact and returns a durable reference

pub mod client;
pub mod error;
pub mod upload;

pub use client::{chunk_key, S3Config, S3WriteTargets, WriteTarget, WriteTargetIssuer};
pub use error::{StorageError, StorageResult};
pub use upload::{UploadHandoff, DEFAULT_UPLOAD_TIMEOUT};
