//! Prometheus metrics for the gateway.

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
    pub const HTTP_REQUESTS_TOTAL: &str = "attn_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "attn_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "attn_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "attn_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "attn_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "attn_ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED: &str = "attn_ws_messages_received_total";
    pub const WS_MESSAGES_MALFORMED: &str = "attn_ws_messages_malformed_total";

    // Ingestion
    pub const FRAMES_INGESTED_TOTAL: &str = "attn_frames_ingested_total";
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

/// Record WebSocket connection.
pub fn record_ws_connection() {
    counter!(names::WS_CONNECTIONS_TOTAL).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(message_type: &str) {
    let labels = [("type", message_type.to_string())];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Record WebSocket message received.
pub fn record_ws_message_received() {
    counter!(names::WS_MESSAGES_RECEIVED).increment(1);
}

pub fn record_ws_message_malformed() {
    counter!(names::WS_MESSAGES_MALFORMED).increment(1);
}

/// Record a frame handed to the pipeline.
pub fn record_frame_ingested(transport: &'static str, accepted: bool) {
    counter!(
        names::FRAMES_INGESTED_TOTAL,
        "transport" => transport,
        "accepted" => if accepted { "true" } else { "false" }
    )
    .increment(1);
}

/// Collapse meeting ids so the path label stays low-cardinality.
fn sanitize_path(path: &str) -> String {
    let mut out = Vec::new();
    let mut after_meetings = false;
    for segment in path.split('/') {
        if after_meetings && !segment.is_empty() {
            out.push(":meeting_id");
        } else {
            out.push(segment);
        }
        after_meetings = segment == "meetings";
    }
    out.join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/meetings/standup-42/frames"),
            "/api/meetings/:meeting_id/frames"
        );
        assert_eq!(sanitize_path("/ws/meetings/abc"), "/ws/meetings/:meeting_id");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
