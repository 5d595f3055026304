//! Axum HTTP API for chunk extraction.
//!
//! This crate provides:
//! - `GET /youtubechunk-to-s3` running the bounded extraction pipeline
//! - `GET /s3url` issuing presigned upload URLs
//! - Liveness and readiness probes
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
