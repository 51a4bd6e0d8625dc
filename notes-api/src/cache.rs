//! Response cache over a [`KvStore`].
//!
//! Read handlers pass the arguments that identify a response; the serialized
//! result is stored under `{prefix}:{function}:{sha256(args)}`. Writers drop a
//! whole prefix with [`ResponseCache::invalidate`].
//!
//! The store is best effort: a failed read is a miss and a failed write or
//! invalidation is logged and skipped. Requests never fail because of it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use notes_core::UserId;
use notes_storage::KvStore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ApiResult;
use crate::telemetry::with_metrics;

/// Prefix under which one owner's note reads are cached.
pub fn notes_prefix(owner_id: UserId) -> String {
    format!("notes:{}", owner_id)
}

/// Build the key for a cached call.
///
/// Arguments are hashed from their JSON form, so equal arguments always map to
/// the same key across processes.
pub fn cache_key<A: Serialize + ?Sized>(
    prefix: &str,
    function: &str,
    args: &A,
) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_vec(args)?;
    let digest = Sha256::digest(&encoded);
    Ok(format!("{}:{}:{}", prefix, function, hex::encode(digest)))
}

#[derive(Clone)]
pub struct ResponseCache {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Return the cached result for `(prefix, function, args)` or await
    /// `fetch` and cache what it returns. `fetch` is only polled on a miss.
    /// Errors from `fetch` are never cached.
    pub async fn cached<T, A, Fut>(
        &self,
        prefix: &str,
        function: &'static str,
        args: &A,
        fetch: Fut,
    ) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        A: Serialize + ?Sized,
        Fut: Future<Output = ApiResult<T>>,
    {
        let key = match cache_key(prefix, function, args) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(function, error = %e, "Cache key could not be built, bypassing cache");
                return fetch.await;
            }
        };

        match self.kv.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    tracing::debug!(key = %key, "Cache hit");
                    with_metrics(|m| m.record_cache_lookup(function, "hit"));
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Cached value is unreadable, refetching");
                    with_metrics(|m| m.record_cache_lookup(function, "error"));
                }
            },
            Ok(None) => {
                tracing::debug!(key = %key, "Cache miss");
                with_metrics(|m| m.record_cache_lookup(function, "miss"));
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, falling through");
                with_metrics(|m| m.record_cache_lookup(function, "error"));
            }
        }

        let value = fetch.await?;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(e) = self.kv.set_ex(&key, &bytes, self.ttl).await {
                    tracing::warn!(key = %key, error = %e, "Cache write failed");
                }
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Response could not be serialized for caching"),
        }

        Ok(value)
    }

    /// Drop every cached entry under `prefix`.
    pub async fn invalidate(&self, prefix: &str) {
        match self.kv.delete_prefix(prefix).await {
            Ok(removed) => tracing::debug!(prefix, removed, "Cache invalidated"),
            Err(e) => tracing::warn!(prefix, error = %e, "Cache invalidation failed"),
        }
    }
}
