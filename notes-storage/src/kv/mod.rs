//! Key-value store abstraction for cached responses and rate-limit counters.
//!
//! Two backends are provided: [`RedisKv`] for shared deployments and
//! [`MemoryKv`] for single-process runs and tests. Callers treat every error
//! as "store unreachable" and degrade instead of failing the request.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use notes_core::KvError;

pub use memory::MemoryKv;
pub use redis_store::RedisKv;

/// Result type alias for key-value operations.
pub type KvResult<T> = Result<T, KvError>;

/// Counter state after an increment in a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests seen in the current window, including this one.
    pub count: u64,
    /// Time until the window expires and the count starts over.
    pub resets_in: Duration,
}

/// Backend for the response cache and the rate limiter.
///
/// Keys are colon-separated (`notes:7:list_notes:<digest>`,
/// `rate_limit:10.0.0.1`). Values are opaque bytes.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value, `None` if missing or expired.
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Set a value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<()>;

    /// Delete every key of the form `{prefix}:*`. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> KvResult<u64>;

    /// Increment the counter at `key`. The first increment creates it with
    /// count 1 and an expiry of `window`; later increments leave the expiry
    /// alone.
    async fn incr_window(&self, key: &str, window: Duration) -> KvResult<WindowCount>;

    /// Check that the store is reachable.
    async fn ping(&self) -> KvResult<()>;
}

/// Pattern matching every key under `prefix`, with glob metacharacters in the
/// prefix escaped.
pub(crate) fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 2);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(":*");
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_pattern() {
        assert_eq!(prefix_pattern("notes:7"), "notes:7:*");
        assert_eq!(prefix_pattern("a*b"), "a\\*b:*");
    }
}
