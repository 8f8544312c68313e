//! Client for the external decision backend.
//!
//! `POST {AI_URL}/ai/decide` returns a proposed action; `POST {AI_URL}/ai/feedback`
//! forwards user feedback. Both go through the same [`RetryPolicy`]. Every
//! attempt has its own timeout, independent of the inbound request timeout.
//!
//! The client only checks that the decide response has the expected JSON
//! shape. Whether the proposed action is usable is the safety gateway's call.

use std::time::Duration;

use reqwest::header::{HeaderValue, InvalidHeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use luma_core::actions::CandidateAction;
use luma_core::context::Context;

use crate::retry::{RetryExhausted, RetryPolicy};

pub const DEFAULT_POLICY_VERSION: &str = "policy_v0";
pub const DEFAULT_MODEL_VERSION: &str = "stub";

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. "http://127.0.0.1:8788"
    pub base_url: String,
    /// Per-attempt timeout (connect + response)
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl BackendConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

/// Why a single attempt failed. All variants are retryable.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("backend returned status {0}")]
    Status(StatusCode),
    #[error("malformed backend response: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("decision backend unavailable after {attempts} attempts: {last}")]
    Unavailable {
        attempts: u32,
        #[source]
        last: AttemptError,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// Rejected before any attempt; retrying cannot fix it.
    #[error("request_id cannot be sent as a header: {0}")]
    InvalidRequestId(#[source] InvalidHeaderValue),
}

impl From<RetryExhausted<AttemptError>> for BackendError {
    fn from(exhausted: RetryExhausted<AttemptError>) -> Self {
        BackendError::Unavailable {
            attempts: exhausted.attempts,
            last: exhausted.last,
        }
    }
}

#[derive(Serialize)]
struct DecideRequest<'a> {
    context: &'a Context,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct DecideResponse {
    action: CandidateAction,
    #[serde(default)]
    policy_version: Option<String>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Serialize)]
struct FeedbackPayload<'a> {
    request_id: &'a str,
    feedback: &'a str,
}

/// What the backend proposed, with provenance always filled in.
#[derive(Debug, Clone)]
pub struct BackendDecision {
    pub action: CandidateAction,
    pub policy_version: String,
    pub model_version: String,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(BackendError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ask the backend for an action. Retries on transport errors, status
    /// >= 400 and unparseable bodies.
    pub async fn decide(
        &self,
        context: &Context,
        request_id: Option<&str>,
    ) -> Result<BackendDecision, BackendError> {
        let url = format!("{}/ai/decide", self.base_url);
        let payload = DecideRequest {
            context,
            request_id,
        };
        let id_header = request_id.map(request_id_header).transpose()?;

        let response = self
            .retry
            .run("ai_decide", |_| {
                self.decide_once(&url, &payload, id_header.as_ref())
            })
            .await?;

        Ok(BackendDecision {
            action: response.action,
            policy_version: non_blank_or(response.policy_version, DEFAULT_POLICY_VERSION),
            model_version: non_blank_or(response.model_version, DEFAULT_MODEL_VERSION),
        })
    }

    async fn decide_once(
        &self,
        url: &str,
        payload: &DecideRequest<'_>,
        id_header: Option<&HeaderValue>,
    ) -> Result<DecideResponse, AttemptError> {
        let mut request = self.client.post(url).json(payload);
        if let Some(value) = id_header {
            request = request.header(REQUEST_ID_HEADER, value.clone());
        }

        let response = request.send().await.map_err(AttemptError::Transport)?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(AttemptError::Status(status));
        }

        let body = response.bytes().await.map_err(AttemptError::Transport)?;
        serde_json::from_slice(&body).map_err(AttemptError::Decode)
    }

    /// Forward user feedback. No response body is expected, so only
    /// transport errors and status >= 400 are retried.
    pub async fn submit_feedback(
        &self,
        request_id: &str,
        feedback: &str,
    ) -> Result<(), BackendError> {
        let url = format!("{}/ai/feedback", self.base_url);
        let payload = FeedbackPayload {
            request_id,
            feedback,
        };
        let id_header = request_id_header(request_id)?;

        self.retry
            .run("ai_feedback", |_| {
                self.feedback_once(&url, &payload, &id_header)
            })
            .await?;

        Ok(())
    }

    async fn feedback_once(
        &self,
        url: &str,
        payload: &FeedbackPayload<'_>,
        id_header: &HeaderValue,
    ) -> Result<(), AttemptError> {
        let response = self
            .client
            .post(url)
            .header(REQUEST_ID_HEADER, id_header.clone())
            .json(payload)
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(AttemptError::Status(status));
        }
        Ok(())
    }
}

fn request_id_header(request_id: &str) -> Result<HeaderValue, BackendError> {
    HeaderValue::from_str(request_id).map_err(BackendError::InvalidRequestId)
}

fn non_blank_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
