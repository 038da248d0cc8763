//! API Handlers
//!
//! HTTP request handlers for the object, stats and health endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;

use crate::coordinator::{RequestCoordinator, ServedObject};
use crate::error::{ProxyError, Result};
use crate::models::{HealthResponse, StatsResponse};

/// Response header telling whether the object came from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RequestCoordinator>,
}

impl AppState {
    pub fn new(coordinator: RequestCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

/// Handler for GET /{bucket}/{path...}
///
/// Resolves the object through the coordinator, then streams the cached file
/// with content type, length and range support from `ServeFile`.
pub async fn object_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    request: Request,
) -> Result<Response> {
    let served = state.coordinator.fetch(&key).await?;
    serve_cached(&key, served, request).await
}

/// Streams a cached file. A file evicted since the lookup answers with the
/// usual JSON not-found error.
async fn serve_cached(key: &str, served: ServedObject, request: Request) -> Result<Response> {
    let mut response = match ServeFile::new(&served.path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        warn!(key, path = %served.path.display(), "Cached file vanished before serving");
        return Err(ProxyError::NotFound(key.to_string()));
    }

    let marker = if served.hit { "HIT" } else { "MISS" };
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(marker));

    Ok(response)
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.coordinator.stats().await;
    Json(StatsResponse::from(stats))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
