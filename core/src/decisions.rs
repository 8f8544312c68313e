use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::actions::Action;
use crate::context::Context;
use crate::gateway::GatewayDecision;

/// Body of `POST /v1/decision`
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct DecisionRequest {
    pub context: Context,
    /// Caller-chosen correlation id. Generated server-side when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The persisted outcome of one decision request. Also the response body of
/// `POST /v1/decision`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecisionRecord {
    /// Unique across the store
    pub request_id: String,
    pub context: Context,
    /// The action after the safety gateway
    pub action: Action,
    /// Backend policy version, suffixed when the gateway replaced the action
    pub policy_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Wall-clock time spent in the backend call only
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
    /// Gateway audit entry for this decision
    pub gateway: GatewayDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

/// Body of `POST /v1/feedback`. Both fields are required; they default to
/// empty so a missing field yields a precise validation error.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponse {
    pub status: String,
}

impl FeedbackResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// One immutable row of feedback history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedbackEvent {
    pub request_id: String,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

/// A decision as read back from the store by `GET /v1/logs`.
///
/// Context, action and gateway audit are returned as stored JSON; a blob
/// that no longer decodes comes back as a JSON string instead of failing the
/// whole listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogEntry {
    pub request_id: String,
    #[schema(value_type = Object)]
    pub context: serde_json::Value,
    #[schema(value_type = Object)]
    pub action: serde_json::Value,
    #[schema(value_type = Object)]
    pub gateway: serde_json::Value,
    pub policy_version: String,
    pub model_version: Option<String>,
    pub latency_ms: i64,
    pub user_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}
