//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "clipchat_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "clipchat_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "clipchat_http_requests_in_flight";

    // Job metrics
    pub const JOBS_CREATED_TOTAL: &str = "clipchat_jobs_created_total";
    pub const JOBS_ENQUEUED_TOTAL: &str = "clipchat_jobs_enqueued_total";
    pub const PLANNER_FAILURES_TOTAL: &str = "clipchat_planner_failures_total";

    // Store metrics
    pub const QUEUE_LENGTH: &str = "clipchat_queue_length";
    pub const HISTORY_LENGTH: &str = "clipchat_history_length";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "clipchat_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a created job (`generate` or `edit`).
pub fn record_job_created(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_CREATED_TOTAL, &labels).increment(1);
}

pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

pub fn record_planner_failure() {
    counter!(names::PLANNER_FAILURES_TOTAL).increment(1);
}

/// Update store gauges from the readiness probe.
pub fn set_store_lengths(queue: u64, history: u64) {
    gauge!(names::QUEUE_LENGTH).set(queue as f64);
    gauge!(names::HISTORY_LENGTH).set(history as f64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse job ids in a path so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let replaced = if previous == "jobs" && !segment.is_empty() {
                ":id"
            } else {
                segment
            };
            previous = segment;
            replaced
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/jobs/550e8400-e29b-41d4-a716-446655440000/plan"),
            "/api/jobs/:id/plan"
        );
        assert_eq!(sanitize_path("/api/jobs"), "/api/jobs");
        assert_eq!(sanitize_path("/api/history"), "/api/history");
    }
}
