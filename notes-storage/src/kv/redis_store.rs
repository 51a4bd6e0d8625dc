use std::time::Duration;

use async_trait::async_trait;
use notes_core::KvError;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use super::{prefix_pattern, KvResult, KvStore, WindowCount};

const SCAN_BATCH: usize = 500;

fn command_error(err: RedisError) -> KvError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        KvError::Unavailable {
            reason: err.to_string(),
        }
    } else {
        KvError::Command {
            reason: err.to_string(),
        }
    }
}

/// Redis-backed store sharing one auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Connect to `url` (e.g. `redis://localhost:6379/0`).
    pub async fn connect(url: &str) -> KvResult<Self> {
        let client = Client::open(url).map_err(command_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(command_error)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(command_error)?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> KvResult<u64> {
        let mut conn = self.conn.clone();
        let pattern = prefix_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(command_error)?;
            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await.map_err(command_error)?;
                removed += deleted;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }

    async fn incr_window(&self, key: &str, window: Duration) -> KvResult<WindowCount> {
        let mut conn = self.conn.clone();
        let window_secs = window.as_secs().max(1);
        let count: u64 = conn.incr(key, 1u64).await.map_err(command_error)?;
        if count == 1 {
            let _: () = conn
                .expire(key, window_secs as i64)
                .await
                .map_err(command_error)?;
            return Ok(WindowCount {
                count,
                resets_in: Duration::from_secs(window_secs),
            });
        }

        // -1 means a previous EXPIRE was lost; re-arm it so the key cannot live forever.
        let ttl: i64 = conn.ttl(key).await.map_err(command_error)?;
        let resets_in = if ttl < 0 {
            let _: () = conn
                .expire(key, window_secs as i64)
                .await
                .map_err(command_error)?;
            window_secs
        } else {
            ttl as u64
        };
        Ok(WindowCount {
            count,
            resets_in: Duration::from_secs(resets_in),
        })
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod tests {
    use super::*;

    async fn connect() -> KvResult<RedisKv> {
        let url = std::env::var("NOTES_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string());
        RedisKv::connect(&url).await
    }

    #[tokio::test]
    async fn test_redis_prefix_invalidation() -> KvResult<()> {
        let kv = connect().await?;
        let ttl = Duration::from_secs(30);
        kv.set_ex("redis-test:1:a", b"x", ttl).await?;
        kv.set_ex("redis-test:1:b", b"y", ttl).await?;
        kv.set_ex("redis-test:2:a", b"z", ttl).await?;

        assert_eq!(kv.delete_prefix("redis-test:1").await?, 2);
        assert_eq!(kv.get("redis-test:2:a").await?, Some(b"z".to_vec()));
        kv.delete_prefix("redis-test").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_redis_window_counter() -> KvResult<()> {
        let kv = connect().await?;
        let key = format!("rate_limit:test-{}", std::process::id());
        let first = kv.incr_window(&key, Duration::from_secs(30)).await?;
        let second = kv.incr_window(&key, Duration::from_secs(30)).await?;
        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert!(second.resets_in <= Duration::from_secs(30));
        Ok(())
    }
}
