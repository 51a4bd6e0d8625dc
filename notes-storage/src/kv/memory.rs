use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{KvResult, KvStore, WindowCount};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

/// Writes between sweeps of expired entries.
const SWEEP_EVERY_WRITES: u64 = 1024;

/// Process-local key-value store.
///
/// Expired entries are dropped lazily on read and by a sweep every
/// [`SWEEP_EVERY_WRITES`] writes, so keys that are never read again do not
/// accumulate. Uses the tokio clock, so tests can pause and advance time.
#[derive(Debug, Default)]
pub struct MemoryKv {
    values: DashMap<String, Entry>,
    counters: DashMap<String, Counter>,
    writes: AtomicU64,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) values.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.values.iter().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired value and rate-limit counter.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.values.retain(|_, entry| entry.expires_at > now);
        self.counters.retain(|_, counter| counter.expires_at > now);
    }

    /// Must be called with no map guard held; `retain` locks every shard.
    fn record_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY_WRITES == 0 {
            self.purge_expired();
        }
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let expired = match self.values.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.values.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<()> {
        self.values.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        self.record_write();
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> KvResult<u64> {
        let scoped = format!("{}:", prefix);
        let keys: Vec<String> = self
            .values
            .iter()
            .filter(|e| e.key().starts_with(&scoped))
            .map(|e| e.key().clone())
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.values.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn incr_window(&self, key: &str, window: Duration) -> KvResult<WindowCount> {
        let now = Instant::now();
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now + window,
        });
        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + window;
        }
        counter.count += 1;
        let window_count = WindowCount {
            count: counter.count,
            resets_in: counter.expires_at.saturating_duration_since(now),
        };
        drop(counter);

        self.record_write();
        Ok(window_count)
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }
}
