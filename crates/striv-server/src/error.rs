//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all API endpoints. It implements
//! `axum::response::IntoResponse` to produce structured JSON error responses
//! with appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use striv_store::StoreError;

use crate::driver::DriverError;
use crate::render::RenderError;
use crate::schema::validation::FieldError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details (e.g., field errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request: bad key, page token or range (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request body failed field validation (422).
    #[error("validation failed")]
    ValidationFailed(Vec<FieldError>),

    /// The job is well-formed but cannot be rendered or installed (422).
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ApiErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorDetail {
                    code: "BAD_REQUEST".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiError::ValidationFailed(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorDetail {
                    code: "VALIDATION_FAILED".to_string(),
                    message: format!("{} invalid field(s)", errors.len()),
                    details: serde_json::to_value(errors).ok(),
                },
            ),
            ApiError::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorDetail {
                    code: "UNPROCESSABLE".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            ApiError::InternalError(msg) => {
                tracing::warn!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorDetail {
                        code: "INTERNAL_ERROR".to_string(),
                        message: msg.clone(),
                        details: None,
                    },
                )
            }
        };

        let body = serde_json::json!({
            "success": false,
            "error": detail,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::EntityNotFound(_) => ApiError::NotFound(err.to_string()),
            _ if err.is_caller_error() => ApiError::BadRequest(err.to_string()),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        tracing::info!(error = %err, "job rendering failed");
        ApiError::Unprocessable(err.to_string())
    }
}

impl From<DriverError> for ApiError {
    fn from(err: DriverError) -> Self {
        match &err {
            DriverError::UnknownDriver(_) => ApiError::Unprocessable(err.to_string()),
            DriverError::Backend { .. } => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        tracing::info!(count = errors.len(), "input validation failed");
        ApiError::ValidationFailed(errors)
    }
}
