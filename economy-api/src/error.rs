//! API error types and the HTTP mapping of the core taxonomy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use economy_core::EconomyError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// API error types.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found or already processed")]
    NotFoundOrAlreadyProcessed,

    #[error("Rate limited")]
    RateLimited { retry_after_secs: u64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EconomyError> for ApiError {
    fn from(err: EconomyError) -> Self {
        match err {
            EconomyError::Unauthenticated(msg) => ApiError::Unauthorized(msg),
            EconomyError::Validation(msg) => ApiError::Validation(msg),
            EconomyError::NotFoundOrAlreadyProcessed => ApiError::NotFoundOrAlreadyProcessed,
            EconomyError::RateLimited { retry_after_secs } => {
                ApiError::RateLimited { retry_after_secs }
            }
            EconomyError::Conflict(key) => ApiError::Conflict(key),
            EconomyError::Storage(msg) | EconomyError::Serialization(msg) => {
                ApiError::Internal(msg)
            }
        }
    }
}

/// Error response body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, retry_after_secs, correlation_id) = match &self {
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None, None)
            }
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None, None)
            }
            ApiError::NotFoundOrAlreadyProcessed => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND_OR_ALREADY_PROCESSED",
                "Not found or already processed".to_string(),
                None,
                None,
            ),
            ApiError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Rate limited".to_string(),
                Some(*retry_after_secs),
                None,
            ),
            ApiError::Conflict(key) => (
                StatusCode::CONFLICT,
                "IDEMPOTENCY_CONFLICT",
                format!("Divergent payload under idempotency key {}", key),
                None,
                None,
            ),
            ApiError::Internal(msg) => {
                // The internal detail stays in the logs; the client gets
                // a correlation id and a retry hint.
                let correlation_id = Uuid::new_v4().to_string();
                tracing::error!(
                    correlation_id = %correlation_id,
                    error = %msg,
                    "internal error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal error, safe to retry".to_string(),
                    None,
                    Some(correlation_id),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            retry_after_secs,
            correlation_id,
        };

        (status, Json(body)).into_response()
    }
}

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;
