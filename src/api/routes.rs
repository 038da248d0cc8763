//! API Routes
//!
//! Configures the Axum router with all proxy endpoints.

use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::handlers::{health_handler, object_handler, stats_handler, AppState};

/// Default upper bound for producing a response, download included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Creates the main router with all endpoints configured.
///
/// The fixed `/health` and `/stats` routes take precedence over the object
/// wildcard. Methods other than GET (and HEAD) answer 405.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
/// - Timeout: 408 when no response is ready within [`DEFAULT_REQUEST_TIMEOUT`]
pub fn create_router(state: AppState) -> Router {
    create_router_with_timeout(state, DEFAULT_REQUEST_TIMEOUT)
}

/// Same as [`create_router`] with a custom request timeout.
pub fn create_router_with_timeout(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/*key", get(object_handler))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
