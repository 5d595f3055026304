//! Inbound chunk request and its validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Query parameters of a chunk extraction request.
///
/// `start` and `end` are seconds; fractional values are rounded to whole
/// seconds before validation. Offsets past [`MAX_OFFSET_SECS`] are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRequest {
    /// Source video URL
    pub url: String,
    /// Start offset in seconds
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
}

/// Largest accepted offset, one day in seconds.
pub const MAX_OFFSET_SECS: u64 = 86_400;

/// A validated `[start, end)` range in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start_secs: u64,
    pub end_secs: u64,
}

/// Request validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid {0} offset: {1}")]
    InvalidOffset(&'static str, f64),

    #[error("End ({end}s) must be after start ({start}s)")]
    EmptyRange { start: u64, end: u64 },
}

impl ChunkRequest {
    /// Validate the request, returning the rounded range.
    pub fn validate(&self) -> Result<ChunkRange, RequestError> {
        let parsed =
            Url::parse(self.url.trim()).map_err(|_| RequestError::InvalidUrl(self.url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RequestError::InvalidUrl(self.url.clone()));
        }

        let start_secs = round_offset("start", self.start)?;
        let end_secs = round_offset("end", self.end)?;

        if end_secs <= start_secs {
            return Err(RequestError::EmptyRange {
                start: start_secs,
                end: end_secs,
            });
        }

        Ok(ChunkRange {
            start_secs,
            end_secs,
        })
    }
}

fn round_offset(name: &'static str, value: f64) -> Result<u64, RequestError> {
    if !value.is_finite() || value < 0.0 || value.round() > MAX_OFFSET_SECS as f64 {
        return Err(RequestError::InvalidOffset(name, value));
    }
    Ok(value.round() as u64)
}
