//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};
use ytchunk_pipeline::PipelineError;
use ytchunk_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Body returned for every server-side failure.
pub const GENERIC_ERROR_BODY: &str = "An error occurred";

/// Body returned for rejected requests.
pub const INVALID_REQUEST_BODY: &str = "Invalid request parameters";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Details go to the log, never to the client
        let body = match &self {
            ApiError::Validation(detail) => {
                warn!(detail = %detail, "Rejected request");
                INVALID_REQUEST_BODY
            }
            ApiError::Pipeline(e) => {
                error!(kind = e.kind(), "{}", self);
                GENERIC_ERROR_BODY
            }
            _ => {
                error!("{}", self);
                GENERIC_ERROR_BODY
            }
        };

        (status, body).into_response()
    }
}
