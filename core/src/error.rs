use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Structured error response. Every non-2xx body has this shape so clients
/// can branch on `error` without parsing `message`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "upstream_unavailable")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";
    pub const STORAGE_ERROR: &str = "storage_error";
    pub const IDEMPOTENCY_CONFLICT: &str = "idempotency_conflict";
    pub const REQUEST_TIMEOUT: &str = "request_timeout";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
