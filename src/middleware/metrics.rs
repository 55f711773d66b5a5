use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder once; later calls return the same handle
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("dispatch_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()?;

    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_counter!(
        "http_responses_total",
        "Total number of HTTP responses by status"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "dispatch_requests_total",
        "Dispatched requests by controller and status"
    );
    describe_histogram!(
        "dispatch_duration_seconds",
        "Time spent in the dispatcher in seconds"
    );

    PROMETHEUS_HANDLE.set(handle.clone()).ok();
    Ok(handle)
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Middleware to collect metrics for requests.
/// Labels use the method and status only; paths are unbounded under
/// convention routing.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    counter!("http_requests_total", "method" => method.clone()).increment(1);

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    histogram!(
        "http_request_duration_seconds",
        "method" => method.clone(),
        "status" => status.to_string()
    )
    .record(duration);

    counter!(
        "http_responses_total",
        "method" => method,
        "status_class" => format!("{}xx", status / 100)
    )
    .increment(1);

    response
}

/// Handler for Prometheus metrics endpoint
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}
