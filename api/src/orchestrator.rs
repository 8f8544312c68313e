//! Per-request decision pipeline:
//! validate → call backend (with retries) → safety gateway → persist.
//!
//! Any stage failure short-circuits. Feedback is stored locally first; the
//! forward to the backend is best-effort and runs in the background.

use std::time::Instant;

use chrono::Utc;
use reqwest::header::HeaderValue;
use tokio::task::JoinHandle;
use uuid::Uuid;

use luma_core::decisions::{
    DecisionRecord, DecisionRequest, FeedbackEvent, FeedbackRequest, LogEntry,
};
use luma_core::gateway;

use crate::backend::{BackendClient, BackendError};
use crate::store::{DecisionStore, StoreError};

pub const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("{message}")]
    Validation {
        message: String,
        field: &'static str,
    },
    #[error(transparent)]
    Upstream(#[from] BackendError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DecisionError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DecisionError::Validation {
            message: message.into(),
            field,
        }
    }
}

/// Owns the store and the backend client; shared across requests behind an
/// `Arc` in the app state.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    store: DecisionStore,
    backend: BackendClient,
}

impl Orchestrator {
    pub fn new(store: DecisionStore, backend: BackendClient) -> Self {
        Self { store, backend }
    }

    pub fn store(&self) -> &DecisionStore {
        &self.store
    }

    pub async fn handle_decision(
        &self,
        request: DecisionRequest,
    ) -> Result<DecisionRecord, DecisionError> {
        let DecisionRequest {
            mut context,
            request_id,
        } = request;

        if context.user_text.trim().is_empty() {
            return Err(DecisionError::validation(
                "context.user_text",
                "context.user_text must not be empty",
            ));
        }
        let request_id = match request_id {
            Some(id) => validate_request_id(id)?,
            None => Uuid::now_v7().to_string(),
        };
        if context.timestamp == 0 {
            context.timestamp = Utc::now().timestamp_millis();
        }

        let started = Instant::now();
        let outcome = self.backend.decide(&context, Some(&request_id)).await;
        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let proposal = outcome.inspect_err(|err| {
            tracing::error!(request_id = %request_id, latency_ms, error = %err, "decision backend unavailable");
        })?;

        let (action, audit) = gateway::evaluate(&context, &proposal.action);
        if let Some(reason) = audit.override_reason {
            tracing::info!(
                request_id = %request_id,
                reason = reason.as_str(),
                overridden = audit.overridden,
                "safety gateway flagged action"
            );
        }

        let record = DecisionRecord {
            policy_version: audit.policy_version(&proposal.policy_version),
            model_version: Some(proposal.model_version),
            request_id,
            context,
            action,
            latency_ms,
            created_at: Utc::now(),
            gateway: audit,
            user_feedback: None,
        };

        self.store.insert_decision(&record).await.inspect_err(|err| {
            tracing::error!(request_id = %record.request_id, error = %err, "failed to persist decision");
        })?;

        tracing::info!(
            request_id = %record.request_id,
            action_type = %record.action.action_type,
            policy_version = %record.policy_version,
            latency_ms = record.latency_ms,
            "decision recorded"
        );

        Ok(record)
    }

    /// Store feedback, then forward it to the backend in the background.
    ///
    /// The returned handle resolves when the forward attempt finishes; its
    /// outcome is only logged.
    pub async fn handle_feedback(
        &self,
        request: FeedbackRequest,
    ) -> Result<JoinHandle<()>, DecisionError> {
        let request_id = request.request_id.trim().to_string();
        let feedback = request.feedback;
        if request_id.is_empty() {
            return Err(DecisionError::validation(
                "request_id",
                "request_id and feedback are required",
            ));
        }
        if feedback.trim().is_empty() {
            return Err(DecisionError::validation(
                "feedback",
                "request_id and feedback are required",
            ));
        }
        let request_id = validate_request_id(request_id)?;

        let linked = self.store.record_feedback(&request_id, &feedback).await?;
        if !linked {
            tracing::warn!(request_id = %request_id, "feedback recorded for unknown request_id");
        }

        let backend = self.backend.clone();
        Ok(tokio::spawn(async move {
            if let Err(err) = backend.submit_feedback(&request_id, &feedback).await {
                tracing::warn!(request_id = %request_id, error = %err, "failed to forward feedback");
            }
        }))
    }

    pub async fn list_logs(&self, limit: i64) -> Result<Vec<LogEntry>, DecisionError> {
        Ok(self.store.list_logs(limit).await?)
    }

    pub async fn feedback_history(
        &self,
        request_id: &str,
    ) -> Result<Vec<FeedbackEvent>, DecisionError> {
        Ok(self.store.feedback_history(request_id).await?)
    }
}

fn validate_request_id(id: String) -> Result<String, DecisionError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(DecisionError::validation(
            "request_id",
            "request_id must not be empty when provided",
        ));
    }
    if trimmed.len() > MAX_REQUEST_ID_LEN {
        return Err(DecisionError::validation(
            "request_id",
            format!("request_id must be at most {MAX_REQUEST_ID_LEN} characters"),
        ));
    }
    // Forwarded as X-Request-ID, so it has to be a valid header value.
    if trimmed.chars().any(char::is_control) || HeaderValue::from_str(trimmed).is_err() {
        return Err(DecisionError::validation(
            "request_id",
            "request_id must not contain control characters",
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use luma_core::actions::{ActionType, RiskLevel};
    use luma_core::context::{Context, Mode};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::backend::BackendConfig;
    use crate::retry::testing::instant_policy;

    pub(crate) async fn orchestrator_for(server: &MockServer) -> Orchestrator {
        orchestrator_with_timeout(server, Duration::from_secs(8)).await
    }

    /// Instant retries and a custom per-attempt backend timeout.
    pub(crate) async fn orchestrator_with_timeout(
        server: &MockServer,
        timeout: Duration,
    ) -> Orchestrator {
        let (policy, _) = instant_policy();
        let backend = BackendClient::new(&BackendConfig {
            timeout,
            ..BackendConfig::with_base_url(server.uri())
        })
        .expect("client should build")
        .with_retry_policy(policy);
        let store = DecisionStore::in_memory()
            .await
            .expect("in-memory store should open");
        Orchestrator::new(store, backend)
    }

    pub(crate) async fn mount_decide(server: &MockServer, action: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/ai/decide"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": action,
                "policy_version": "policy_v0"
            })))
            .mount(server)
            .await;
    }

    pub(crate) fn encourage() -> serde_json::Value {
        json!({
            "action_type": "ENCOURAGE",
            "message": "You've got this",
            "confidence": 0.9,
            "cost": 0.2,
            "risk_level": "LOW"
        })
    }

    fn request(mode: Mode) -> DecisionRequest {
        DecisionRequest {
            context: Context::new("can't focus", mode),
            request_id: None,
        }
    }

    #[tokio::test]
    async fn active_context_passes_backend_action_through() {
        let server = MockServer::start().await;
        mount_decide(&server, encourage()).await;
        let orchestrator = orchestrator_for(&server).await;

        let record = orchestrator
            .handle_decision(request(Mode::Active))
            .await
            .expect("decision should succeed");

        assert_eq!(record.action.action_type, ActionType::Encourage);
        assert_eq!(record.action.message, "You've got this");
        assert_eq!(record.action.confidence, 0.9);
        assert_eq!(record.policy_version, "policy_v0");
        assert_eq!(record.model_version.as_deref(), Some("stub"));
        assert!(!record.gateway.overridden);
        assert!(record.context.timestamp > 0);
        assert!(record.latency_ms >= 0);
        assert!(Uuid::parse_str(&record.request_id).is_ok());

        let logs = orchestrator.list_logs(0).await.expect("list");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].request_id, record.request_id);
    }

    #[tokio::test]
    async fn silent_context_always_gets_do_not_disturb() {
        let server = MockServer::start().await;
        mount_decide(&server, encourage()).await;
        let orchestrator = orchestrator_for(&server).await;

        let record = orchestrator
            .handle_decision(request(Mode::Silent))
            .await
            .expect("decision should succeed");

        assert_eq!(record.action.action_type, ActionType::DoNotDisturb);
        assert!(record.gateway.overridden);
        assert_eq!(record.gateway.original_action.action_type, "ENCOURAGE");
    }

    #[tokio::test]
    async fn high_risk_backend_action_is_blocked() {
        let server = MockServer::start().await;
        let mut risky = encourage();
        risky["risk_level"] = json!("HIGH");
        mount_decide(&server, risky).await;
        let orchestrator = orchestrator_for(&server).await;

        let record = orchestrator
            .handle_decision(request(Mode::Active))
            .await
            .expect("decision should succeed");

        assert_eq!(record.action, gateway::safe_action());
        assert_eq!(record.action.risk_level, RiskLevel::Low);
        assert!(record.policy_version.ends_with(":gateway_block"));
    }

    #[tokio::test]
    async fn out_of_range_confidence_never_reaches_storage() {
        let server = MockServer::start().await;
        let mut bogus = encourage();
        bogus["confidence"] = json!(7.5);
        mount_decide(&server, bogus).await;
        let orchestrator = orchestrator_for(&server).await;

        orchestrator
            .handle_decision(request(Mode::Light))
            .await
            .expect("decision should succeed");

        let logs = orchestrator.list_logs(1).await.expect("list");
        let stored = logs[0].action["confidence"].as_f64().expect("confidence");
        assert!((0.0..=1.0).contains(&stored));
        assert_eq!(logs[0].gateway["original_action"]["confidence"], 7.5);
    }

    #[tokio::test]
    async fn blank_user_text_is_rejected_before_backend_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let orchestrator = orchestrator_for(&server).await;

        let mut req = request(Mode::Active);
        req.context.user_text = "   ".to_string();
        let err = orchestrator
            .handle_decision(req)
            .await
            .expect_err("blank text must fail");
        assert!(matches!(
            err,
            DecisionError::Validation {
                field: "context.user_text",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unavailable_backend_persists_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ai/decide"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;
        let orchestrator = orchestrator_for(&server).await;

        let err = orchestrator
            .handle_decision(request(Mode::Active))
            .await
            .expect_err("backend is down");
        assert!(matches!(err, DecisionError::Upstream(_)));
        assert!(orchestrator.list_logs(0).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn caller_request_id_is_used_and_must_be_unique() {
        let server = MockServer::start().await;
        mount_decide(&server, encourage()).await;
        let orchestrator = orchestrator_for(&server).await;

        let mut req = request(Mode::Active);
        req.request_id = Some(" client-7 ".to_string());
        let record = orchestrator
            .handle_decision(req.clone())
            .await
            .expect("first decision");
        assert_eq!(record.request_id, "client-7");

        let err = orchestrator
            .handle_decision(req)
            .await
            .expect_err("duplicate id must fail");
        assert!(matches!(
            err,
            DecisionError::Storage(StoreError::DuplicateRequestId(_))
        ));
    }

    #[tokio::test]
    async fn feedback_is_stored_and_forwarded() {
        let server = MockServer::start().await;
        mount_decide(&server, encourage()).await;
        Mock::given(method("POST"))
            .and(path("/ai/feedback"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let orchestrator = orchestrator_for(&server).await;

        let record = orchestrator
            .handle_decision(request(Mode::Active))
            .await
            .expect("decision");
        let forward = orchestrator
            .handle_feedback(FeedbackRequest {
                request_id: record.request_id.clone(),
                feedback: "that helped".to_string(),
            })
            .await
            .expect("feedback");
        forward.await.expect("forward task should not panic");

        let logs = orchestrator.list_logs(0).await.expect("list");
        assert_eq!(logs[0].user_feedback.as_deref(), Some("that helped"));
        let history = orchestrator
            .feedback_history(&record.request_id)
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].feedback, "that helped");
    }

    #[tokio::test]
    async fn feedback_forward_failure_does_not_fail_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ai/feedback"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;
        let orchestrator = orchestrator_for(&server).await;

        let forward = orchestrator
            .handle_feedback(FeedbackRequest {
                request_id: "unknown".to_string(),
                feedback: "hello".to_string(),
            })
            .await
            .expect("local write succeeds even if forwarding fails");
        forward.await.expect("forward task should not panic");

        let history = orchestrator
            .feedback_history("unknown")
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn feedback_requires_both_fields() {
        let server = MockServer::start().await;
        let orchestrator = orchestrator_for(&server).await;

        for (request_id, feedback) in [("", "x"), ("req", " "), ("", "")] {
            let err = orchestrator
                .handle_feedback(FeedbackRequest {
                    request_id: request_id.to_string(),
                    feedback: feedback.to_string(),
                })
                .await
                .expect_err("missing fields must fail");
            assert!(matches!(err, DecisionError::Validation { .. }));
        }
    }

    #[test]
    fn request_id_validation() {
        assert!(validate_request_id("ok".to_string()).is_ok());
        assert!(validate_request_id("  ".to_string()).is_err());
        assert!(validate_request_id("x".repeat(129)).is_err());
        assert!(validate_request_id("a\u{1}b".to_string()).is_err());
        assert!(validate_request_id("a\tb".to_string()).is_err());
        assert!(validate_request_id("a\u{7f}b".to_string()).is_err());
    }

    #[tokio::test]
    async fn control_characters_in_request_id_never_reach_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let orchestrator = orchestrator_for(&server).await;

        let mut req = request(Mode::Active);
        req.request_id = Some("a\u{1}b".to_string());
        let err = orchestrator
            .handle_decision(req)
            .await
            .expect_err("control characters must fail");
        assert!(matches!(
            err,
            DecisionError::Validation {
                field: "request_id",
                ..
            }
        ));

        let err = orchestrator
            .handle_feedback(FeedbackRequest {
                request_id: "line\nbreak".to_string(),
                feedback: "hi".to_string(),
            })
            .await
            .expect_err("control characters must fail");
        assert!(matches!(
            err,
            DecisionError::Validation {
                field: "request_id",
                ..
            }
        ));
        assert!(
            orchestrator
                .feedback_history("line\nbreak")
                .await
                .expect("history")
                .is_empty()
        );
    }
}
