pub mod handler;

use crate::config::ServerConfig;
use axum::{routing::get, Router};
use handler::AppState;
use std::time::Duration;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Operational endpoints plus the dispatcher as fallback
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(crate::health::health_check))
        .route("/ready", get(crate::health::readiness_check))
        .route("/metrics", get(crate::middleware::metrics_handler))
        .fallback(handler::dispatch_request)
        .with_state(state)
}

/// Router with the standard middleware stack applied
pub fn build_app(state: AppState, server: &ServerConfig) -> Router {
    info!("Setting max request body size: {} bytes", server.max_body_size);
    info!("Setting request timeout: {} seconds", server.timeout);

    build_router(state)
        .layer(RequestBodyLimitLayer::new(server.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server.timeout)))
        .layer(axum::middleware::from_fn(crate::middleware::request_id_middleware))
        .layer(axum::middleware::from_fn(crate::middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
