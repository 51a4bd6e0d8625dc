//! Rate Limiting Middleware
//!
//! Applies [`RateLimiter`] to every request, keyed by client IP. Limited
//! requests get 429 with `retry-after`; allowed ones carry the
//! `x-ratelimit-limit` and `x-ratelimit-remaining` headers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::rate_limit::{RateDecision, RateLimiter};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// State for rate limiting middleware.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    /// Honor `x-forwarded-for` / `x-real-ip`. Off unless a trusted proxy
    /// sets them, since clients can otherwise pick a fresh bucket per request.
    pub trust_proxy_headers: bool,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>, trust_proxy_headers: bool) -> Self {
        Self {
            limiter,
            trust_proxy_headers,
        }
    }
}

/// Client IP for rate limiting.
///
/// The socket peer by default. With `trust_proxy_headers`, the first
/// `x-forwarded-for` entry, then `x-real-ip`, then the peer. Requests with
/// none of these share the `unknown` bucket.
pub fn extract_client_ip(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = proxy_client_ip(request) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn proxy_client_ip(request: &Request) -> Option<String> {
    let headers = request.headers();

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded.or_else(real_ip).map(str::to_string)
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let ip = extract_client_ip(&request, state.trust_proxy_headers);

    match state.limiter.check(&ip).await {
        RateDecision::Limited { limit, retry_after } => Err(RateLimitError { limit, retry_after }),
        RateDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            Ok(response)
        }
        RateDecision::FailOpen => Ok(next.run(request).await),
    }
}

/// Rejection for a client over its limit.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitError {
    pub limit: u64,
    pub retry_after: Duration,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        // Round up so clients never retry inside the current window.
        let partial = u64::from(self.retry_after.subsec_nanos() > 0);
        let retry_after_secs = (self.retry_after.as_secs() + partial).max(1);
        let mut response = ApiError::rate_limited(retry_after_secs).into_response();
        let headers = response.headers_mut();
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u64));
        response
    }
}
