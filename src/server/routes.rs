//! Router configuration

use axum::Router;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

use super::AppState;
use super::handlers;

/// `/` accepts every method so that non-GET requests get a 405 body of the
/// service's own error shape.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/", any(handlers::convert))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
