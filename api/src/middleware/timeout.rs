use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// Give the bare 408 from `TimeoutLayer` the same JSON error body as every
/// other failure. Must sit outside the timeout layer.
pub async fn json_timeout(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() == StatusCode::REQUEST_TIMEOUT
        && !response.headers().contains_key(header::CONTENT_TYPE)
    {
        return AppError::RequestTimeout.into_response();
    }
    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::get;
    use axum::{Router, middleware};
    use tower::ServiceExt;
    use tower_http::timeout::TimeoutLayer;

    use crate::routes::test_support::json_body;

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "done"
    }

    async fn teapot() -> StatusCode {
        StatusCode::IM_A_TEAPOT
    }

    fn app() -> Router {
        Router::new()
            .route("/slow", get(slow))
            .route("/teapot", get(teapot))
            .layer(TimeoutLayer::new(Duration::from_millis(50)))
            .layer(middleware::from_fn(super::json_timeout))
    }

    async fn call(uri: &str) -> axum::response::Response {
        app()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed")
    }

    #[tokio::test]
    async fn timed_out_request_gets_json_error() {
        let response = call("/slow").await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        let body = json_body(response).await;
        assert_eq!(body["error"], "request_timeout");
        assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn other_responses_pass_through() {
        let response = call("/teapot").await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
