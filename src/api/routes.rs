//! Router configuration

use super::handlers::{self, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the API router with body limit and request tracing
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/v1/query", post(handlers::query))
        .route("/api/v1/query/validate", post(handlers::validate_query))
        .route("/api/v1/fact-check", post(handlers::fact_check))
        .route("/api/v1/path", post(handlers::find_path))
        .route("/api/v1/ingest", post(handlers::ingest))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
