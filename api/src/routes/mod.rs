use axum::Router;

use crate::state::AppState;

pub mod decision;
pub mod feedback;
pub mod health;
pub mod logs;

/// Every route of the service, without middleware layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(decision::router())
        .merge(feedback::router())
        .merge(logs::router())
}
