use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use luma_core::decisions::{FeedbackEvent, FeedbackRequest, FeedbackResponse};
use luma_core::error::ApiError;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/feedback", post(submit_feedback))
        .route("/v1/feedback/{request_id}", get(feedback_history))
}

/// Record user feedback on a decision
///
/// Stored locally first, then forwarded to the decision backend in the
/// background. Forwarding failures never fail this request.
#[utoipa::path(
    post,
    path = "/v1/feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback recorded", body = FeedbackResponse),
        (status = 400, description = "request_id or feedback missing", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError)
    ),
    tag = "feedback"
)]
pub async fn submit_feedback(
    State(state): State<AppState>,
    AppJson(req): AppJson<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    // Forward runs detached; its outcome is only logged.
    let _forward = state.orchestrator.handle_feedback(req).await?;
    Ok(Json(FeedbackResponse::ok()))
}

/// Feedback history for a decision, oldest first
#[utoipa::path(
    get,
    path = "/v1/feedback/{request_id}",
    params(("request_id" = String, Path, description = "Decision request id")),
    responses(
        (status = 200, description = "Feedback events (empty for unknown ids)", body = Vec<FeedbackEvent>),
        (status = 500, description = "Storage failure", body = ApiError)
    ),
    tag = "feedback"
)]
pub async fn feedback_history(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<Vec<FeedbackEvent>>, AppError> {
    let events = state.orchestrator.feedback_history(&request_id).await?;
    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::routes::test_support::{app_for, get, json_body, post_json, send};

    #[tokio::test]
    async fn feedback_is_acknowledged_and_listed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ai/feedback"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let (app, _) = app_for(&server).await;

        let response = send(
            &app,
            post_json(
                "/v1/feedback",
                json!({"request_id": "r-1", "feedback": "too chatty"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok"}));

        let response = send(&app, get("/v1/feedback/r-1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let history = json_body(response).await;
        assert_eq!(history.as_array().map(Vec::len), Some(1));
        assert_eq!(history[0]["feedback"], "too chatty");
    }

    #[tokio::test]
    async fn missing_feedback_field_is_rejected() {
        let server = MockServer::start().await;
        let (app, _) = app_for(&server).await;

        let response = send(
            &app,
            post_json("/v1/feedback", json!({"request_id": "r-1"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["field"], "feedback");
    }

    #[tokio::test]
    async fn unknown_id_has_empty_history() {
        let server = MockServer::start().await;
        let (app, _) = app_for(&server).await;

        let response = send(&app, get("/v1/feedback/nope")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }
}
