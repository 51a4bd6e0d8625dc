//! Fixed-window rate limiter keyed by client IP.
//!
//! Each IP gets a counter at `rate_limit:{ip}` that lives for one window. The
//! request that pushes the count past `max_requests` and every later one in
//! the same window is limited. An unreachable counter store lets the request
//! through.

use std::sync::Arc;
use std::time::Duration;

use notes_storage::KvStore;

use crate::telemetry::with_metrics;

/// Outcome of checking one request against the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Under the limit.
    Allowed { limit: u64, remaining: u64 },
    /// Over the limit until the window resets.
    Limited { limit: u64, retry_after: Duration },
    /// Counter store failed; the request goes through unchecked.
    FailOpen,
}

impl RateDecision {
    pub fn is_limited(&self) -> bool {
        matches!(self, RateDecision::Limited { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            RateDecision::Allowed { .. } => "allowed",
            RateDecision::Limited { .. } => "limited",
            RateDecision::FailOpen => "fail_open",
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
    max_requests: u64,
    window: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>, max_requests: u64, window: Duration) -> Self {
        Self {
            kv,
            max_requests,
            window,
        }
    }

    /// Counter key for a client.
    pub fn key_for(ip: &str) -> String {
        format!("rate_limit:{}", ip)
    }

    /// Count this request and decide whether it may proceed.
    pub async fn check(&self, ip: &str) -> RateDecision {
        let key = Self::key_for(ip);
        let decision = match self.kv.incr_window(&key, self.window).await {
            Ok(window) if window.count > self.max_requests => {
                // Never advertise a zero wait while the key still exists.
                let retry_after = window.resets_in.max(Duration::from_secs(1));
                tracing::info!(ip, count = window.count, "Rate limit exceeded");
                RateDecision::Limited {
                    limit: self.max_requests,
                    retry_after,
                }
            }
            Ok(window) => RateDecision::Allowed {
                limit: self.max_requests,
                remaining: self.max_requests - window.count,
            },
            Err(e) => {
                tracing::warn!(ip, error = %e, "Rate limit store unavailable, allowing request");
                RateDecision::FailOpen
            }
        };

        with_metrics(|m| m.record_rate_limit(decision.label()));
        decision
    }
}
