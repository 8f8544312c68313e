use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod backend;
mod config;
mod error;
mod extract;
mod middleware;
mod orchestrator;
mod retry;
mod routes;
mod state;
mod store;

use crate::backend::{BackendClient, BackendConfig};
use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::state::AppState;
use crate::store::DecisionStore;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Luma Decision Gateway API",
        version = "0.1.0",
        description = "Decides what a companion should say right now, with a safety gateway between the decision backend and the user."
    ),
    paths(
        routes::health::health_check,
        routes::decision::create_decision,
        routes::feedback::submit_feedback,
        routes::feedback::feedback_history,
        routes::logs::list_logs,
    ),
    components(schemas(
        routes::health::HealthResponse,
        luma_core::error::ApiError,
        luma_core::context::Context,
        luma_core::context::Mode,
        luma_core::actions::Action,
        luma_core::actions::ActionType,
        luma_core::actions::RiskLevel,
        luma_core::actions::CandidateAction,
        luma_core::gateway::GatewayDecision,
        luma_core::gateway::OverrideReason,
        luma_core::decisions::DecisionRequest,
        luma_core::decisions::DecisionRecord,
        luma_core::decisions::FeedbackRequest,
        luma_core::decisions::FeedbackResponse,
        luma_core::decisions::FeedbackEvent,
        luma_core::decisions::LogEntry,
    ))
)]
struct ApiDoc;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("failed to open decision store: {0}")]
    Store(#[from] store::StoreError),
    #[error("failed to build backend client: {0}")]
    Backend(#[from] backend::BackendError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Routes plus the middleware stack, ready to serve.
fn build_app(state: AppState, server_timeout: Duration) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::timeout::json_timeout))
                .layer(TimeoutLayer::new(server_timeout))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;

    let store = DecisionStore::open(&config.db_path).await?;
    let backend = BackendClient::new(&BackendConfig {
        timeout: config.ai_timeout,
        connect_timeout: config.ai_connect_timeout,
        ..BackendConfig::with_base_url(config.ai_url.clone())
    })?;

    let app_state = AppState::new(Orchestrator::new(store, backend));
    let app = build_app(app_state, config.server_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        ai_url = %config.ai_url,
        db_path = %config.db_path.display(),
        "Luma API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "luma_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "Luma API failed");
        std::process::exit(1);
    }
}
