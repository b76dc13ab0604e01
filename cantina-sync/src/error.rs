//! Error types for the cantina-sync HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Required body properties absent (400)
    #[error("Missing properties: {}", .0.join(", "))]
    MissingProperties(Vec<String>),

    /// Property present but out of range or wrong type (400)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Admin key absent (401)
    #[error("Missing key.")]
    MissingKey,

    /// Admin key wrong (401)
    #[error("Invalid key.")]
    InvalidKey,

    /// cantina-common error
    #[error("Common error: {0}")]
    Common(#[from] cantina_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::MissingProperties(_) => {
                (StatusCode::BAD_REQUEST, "MISSING_PROPERTY", self.to_string())
            }
            ApiError::InvalidValue(msg) => (StatusCode::BAD_REQUEST, "INVALID_TYPE", msg.clone()),
            ApiError::MissingKey => (StatusCode::UNAUTHORIZED, "MISSING_KEY", self.to_string()),
            ApiError::InvalidKey => (StatusCode::UNAUTHORIZED, "INVALID_KEY", self.to_string()),
            ApiError::Common(cantina_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
            }
            ApiError::Common(cantina_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
            }
            ApiError::Common(err) => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string())
            }
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let ApiError::MissingProperties(properties) = &self {
            error["missingProperties"] = json!(properties);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
