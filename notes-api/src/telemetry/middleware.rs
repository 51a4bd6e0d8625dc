//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in an `http_request` span, logs the request and the
//! response, and records Prometheus metrics.

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::with_metrics;

static NUMERIC_ID: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/\d+(/|$)").ok());

/// Normalize path for metrics/spans (replace numeric IDs with a placeholder).
///
/// Keeps Prometheus label cardinality bounded.
fn normalize_path(path: &str) -> String {
    match NUMERIC_ID.as_ref() {
        // Replacing twice handles adjacent ids such as /1/2, where the
        // shared slash stops the second match in the first pass.
        Some(re) => {
            let once = re.replace_all(path, "/{id}$1");
            re.replace_all(&once, "/{id}$1").into_owned()
        }
        None => path.to_string(),
    }
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.route = %normalized_path,
    );

    let response = async {
        tracing::info!(event = "request", method = %method, path = %path, "Request received");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    with_metrics(|m| {
        m.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        )
    });

    span.in_scope(|| {
        tracing::info!(
            event = "response",
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_numeric_id() {
        assert_eq!(normalize_path("/notes/12345"), "/notes/{id}");
    }

    #[test]
    fn test_normalize_path_adjacent_ids() {
        assert_eq!(normalize_path("/a/1/2"), "/a/{id}/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/notes"), "/notes");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/ws-test"), "/ws-test");
    }

    #[test]
    fn test_normalize_path_keeps_mixed_segments() {
        assert_eq!(normalize_path("/v2notes/abc123"), "/v2notes/abc123");
    }
}
