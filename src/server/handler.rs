use crate::dispatcher::RequestDispatcher;
use crate::middleware::RequestId;
use crate::request::DispatchRequest;
use crate::response::DispatchResponse;
use crate::routing::HttpMethod;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RequestDispatcher>,
    pub max_body_size: usize,
}

/// Fallback handler: every path not served by axum goes through the dispatcher
pub async fn dispatch_request(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();

    let method: HttpMethod = parts
        .method
        .as_str()
        .parse()
        .map_err(AppError::UnsupportedMethod)?;
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut dispatch_request = DispatchRequest::new(method, target);
    if let Some(host) = parts.headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        dispatch_request = dispatch_request.host(host);
    }
    if let Some(RequestId(id)) = parts.extensions.get::<RequestId>() {
        dispatch_request = dispatch_request.request_id(id.clone());
    }
    if is_form(&parts.headers) {
        let payload = axum::body::to_bytes(body, state.max_body_size)
            .await
            .map_err(|e| AppError::InvalidBody(e.to_string()))?;
        dispatch_request = dispatch_request.with_form(&payload);
    }

    debug!("Dispatching {} {}", method, dispatch_request.uri());

    // Actions are synchronous and may block
    let dispatcher = state.dispatcher.clone();
    let response = tokio::task::spawn_blocking(move || dispatcher.dispatch(&dispatch_request))
        .await
        .map_err(|e| AppError::Worker(e.to_string()))?;

    Ok(into_http_response(response))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

pub fn into_http_response(response: DispatchResponse) -> Response {
    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);

    if let Ok(content_type) = HeaderValue::from_str(response.content_type()) {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(location) = response.location() {
        if let Ok(location) = HeaderValue::from_str(location) {
            builder = builder.header(header::LOCATION, location);
        }
    }

    builder
        .body(Body::from(response.body().to_string()))
        .unwrap_or_else(|e| {
            error!("Failed to build response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    UnsupportedMethod(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Dispatcher worker failed: {0}")]
    Worker(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        error!("Request failed: {}", self);

        let body = json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
