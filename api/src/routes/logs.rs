use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use luma_core::decisions::LogEntry;
use luma_core::error::ApiError;

use crate::error::AppError;
use crate::extract::AppQuery;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/logs", get(list_logs))
}

/// Query parameters for listing logs
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListLogsParams {
    /// Maximum number of entries (default 50, max 1000). Non-numeric values
    /// fall back to the default.
    #[serde(default)]
    #[param(value_type = Option<i64>)]
    pub limit: Option<String>,
}

impl ListLogsParams {
    fn limit(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// List recorded decisions, newest first
#[utoipa::path(
    get,
    path = "/v1/logs",
    params(ListLogsParams),
    responses(
        (status = 200, description = "Recorded decisions", body = Vec<LogEntry>),
        (status = 400, description = "Query parameter repeated", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError)
    ),
    tag = "decisions"
)]
pub async fn list_logs(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListLogsParams>,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    let entries = state.orchestrator.list_logs(params.limit()).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};

    use super::*;
    use crate::routes::test_support::{app_for, get, json_body, send};
    use crate::store::tests::sample_record;
    use wiremock::MockServer;

    fn params(limit: Option<&str>) -> ListLogsParams {
        ListLogsParams {
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn non_numeric_limit_falls_back_to_default() {
        assert_eq!(params(Some("abc")).limit(), 0);
        assert_eq!(params(None).limit(), 0);
        assert_eq!(params(Some("7")).limit(), 7);
        assert_eq!(params(Some("-3")).limit(), -3);
    }

    #[tokio::test]
    async fn zero_limit_returns_default_page_newest_first() {
        let server = MockServer::start().await;
        let (app, state) = app_for(&server).await;
        let store = state.orchestrator.store();
        for i in 0..55 {
            store
                .insert_decision(&sample_record(&format!("req-{i:02}")))
                .await
                .expect("insert");
        }

        let response = send(&app, get("/v1/logs?limit=0")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let entries = body.as_array().expect("array");
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0]["request_id"], "req-54");

        let response = send(&app, get("/v1/logs?limit=banana")).await;
        let body = json_body(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(50));

        let response = send(&app, get("/v1/logs?limit=2")).await;
        let body = json_body(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn repeated_limit_is_a_json_validation_error() {
        let server = MockServer::start().await;
        let (app, _) = app_for(&server).await;

        let response = send(&app, get("/v1/logs?limit=1&limit=2")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        let body = json_body(response).await;
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["field"], "limit");
    }
}
