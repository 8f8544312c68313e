use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use luma_core::error::{self, ApiError};

use crate::backend::BackendError;
use crate::orchestrator::DecisionError;
use crate::store::StoreError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Decision backend failed after all retries (502)
    UpstreamUnavailable(BackendError),
    /// request_id already has a stored decision (409)
    IdempotencyConflict { request_id: String },
    /// Decision store failure (500)
    Storage(StoreError),
    /// Request outlived the server timeout (408)
    RequestTimeout,
    /// Internal error (500)
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.into()),
            received: None,
            docs_hint: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::UpstreamUnavailable(err) => {
                tracing::error!(error = %err, "decision backend unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError {
                        error: error::codes::UPSTREAM_UNAVAILABLE.to_string(),
                        message: "The decision backend is unavailable".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: Some(
                            "The request was not stored. Retry later with the same request_id."
                                .to_string(),
                        ),
                    },
                )
            }
            AppError::IdempotencyConflict { request_id: taken } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::IDEMPOTENCY_CONFLICT.to_string(),
                    message: format!("A decision with request_id '{taken}' already exists"),
                    field: Some("request_id".to_string()),
                    received: Some(serde_json::Value::String(taken)),
                    request_id,
                    docs_hint: Some(
                        "Each decision needs a unique request_id. If you're retrying, \
                         the original decision was already recorded (see GET /v1/logs)."
                            .to_string(),
                    ),
                },
            ),
            AppError::Storage(err) => {
                tracing::error!(error = ?err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::STORAGE_ERROR.to_string(),
                        message: "Failed to access the decision store".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::RequestTimeout => {
                tracing::warn!("request exceeded server timeout");
                (
                    StatusCode::REQUEST_TIMEOUT,
                    ApiError {
                        error: error::codes::REQUEST_TIMEOUT.to_string(),
                        message: "The request did not complete in time".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: Some(
                            "A decision may still be recorded. Check GET /v1/logs before \
                             retrying with the same request_id."
                                .to_string(),
                        ),
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateRequestId(request_id) => {
                AppError::IdempotencyConflict { request_id }
            }
            other => AppError::Storage(other),
        }
    }
}

impl From<DecisionError> for AppError {
    fn from(err: DecisionError) -> Self {
        match err {
            DecisionError::Validation { message, field } => AppError::validation(message, field),
            DecisionError::Upstream(BackendError::InvalidRequestId(err)) => AppError::Validation {
                message: format!("request_id is not a valid header value: {err}"),
                field: Some("request_id".to_string()),
                received: None,
                docs_hint: None,
            },
            DecisionError::Upstream(err) => AppError::UpstreamUnavailable(err),
            DecisionError::Storage(err) => err.into(),
        }
    }
}
