//! Prometheus Metrics Definitions
//!
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<NotesMetrics>> = Lazy::new(NotesMetrics::new);

/// Container for all service metrics.
#[derive(Clone)]
pub struct NotesMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Current active WebSocket connections - labels: channel
    pub websocket_connections: GaugeVec,

    /// Cache lookups - labels: function, result (hit/miss/error)
    pub cache_lookups_total: CounterVec,

    /// Rate limiter decisions - labels: decision (allowed/limited/fail_open)
    pub rate_limit_decisions_total: CounterVec,
}

fn register_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl NotesMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "notes_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| register_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "notes_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_error("http_request_duration_seconds", e))?,

            websocket_connections: register_gauge_vec!(
                "notes_websocket_connections",
                "Current number of active WebSocket connections",
                &["channel"]
            )
            .map_err(|e| register_error("websocket_connections", e))?,

            cache_lookups_total: register_counter_vec!(
                "notes_cache_lookups_total",
                "Response cache lookups by result",
                &["function", "result"]
            )
            .map_err(|e| register_error("cache_lookups_total", e))?,

            rate_limit_decisions_total: register_counter_vec!(
                "notes_rate_limit_decisions_total",
                "Rate limiter decisions",
                &["decision"]
            )
            .map_err(|e| register_error("rate_limit_decisions_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn ws_connected(&self, channel: &str) {
        self.websocket_connections.with_label_values(&[channel]).inc();
    }

    pub fn ws_disconnected(&self, channel: &str) {
        self.websocket_connections.with_label_values(&[channel]).dec();
    }

    pub fn record_cache_lookup(&self, function: &str, result: &str) {
        self.cache_lookups_total
            .with_label_values(&[function, result])
            .inc();
    }

    pub fn record_rate_limit(&self, decision: &str) {
        self.rate_limit_decisions_total
            .with_label_values(&[decision])
            .inc();
    }
}

/// Run `f` against the global metrics if they registered.
pub fn with_metrics(f: impl FnOnce(&NotesMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
