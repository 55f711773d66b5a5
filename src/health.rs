use crate::server::handler::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Health check endpoint - returns OK if server is running
pub async fn health_check() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

/// Readiness check endpoint - not ready while the route table has conflicts
pub async fn readiness_check(State(state): State<AppState>) -> Response {
    let router = state.dispatcher.router();
    let conflicts: Vec<String> = router
        .config()
        .conflicts()
        .iter()
        .map(|c| c.to_string())
        .collect();

    if !conflicts.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "route_conflict", "conflicts": conflicts})),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "routes": router.config().len(),
            "controllers": router.registry().len(),
        })),
    )
        .into_response()
}
