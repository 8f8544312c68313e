use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use luma_core::decisions::{DecisionRecord, DecisionRequest};
use luma_core::error::ApiError;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/decision", post(create_decision))
}

/// Decide what to tell the user right now
///
/// Asks the decision backend for an action, passes it through the safety
/// gateway and records the outcome. The pipeline runs to completion even
/// if the caller disconnects.
#[utoipa::path(
    post,
    path = "/v1/decision",
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision recorded", body = DecisionRecord),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "request_id already used", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError),
        (status = 502, description = "Decision backend unavailable", body = ApiError)
    ),
    tag = "decisions"
)]
pub async fn create_decision(
    State(state): State<AppState>,
    AppJson(req): AppJson<DecisionRequest>,
) -> Result<Json<DecisionRecord>, AppError> {
    let orchestrator = state.orchestrator.clone();
    let record = tokio::spawn(async move { orchestrator.handle_decision(req).await })
        .await
        .map_err(|err| AppError::Internal(format!("decision task failed: {err}")))??;

    Ok(Json(record))
}
