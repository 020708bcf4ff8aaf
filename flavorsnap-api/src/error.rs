//! Error types for flavorsnap-api

use axum::extract::multipart::MultipartError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use flavorsnap_common::ValidationError;
use serde_json::json;
use thiserror::Error;

/// Body text for every 500; details go to the log only
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// API error type, rendered as `{"error": message}`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Upload rejected by the validator (400)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Malformed or oversized multipart body; status comes from the error
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(err) => err.status(),
            ApiError::Internal(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Validation(err) => err.to_string(),
            ApiError::Multipart(err) => err.body_text(),
            ApiError::Internal(_) | ApiError::Io(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
