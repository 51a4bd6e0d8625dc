//! Notes Storage
//!
//! Persistence behind the [`Storage`] trait (Postgres or in-memory) and the
//! [`KvStore`] trait used by the response cache and the rate limiter (Redis or
//! in-memory).

pub mod kv;
mod memory;
mod postgres;
mod storage;

pub use kv::{KvResult, KvStore, MemoryKv, RedisKv, WindowCount};
pub use memory::InMemoryStorage;
pub use postgres::{DbConfig, PgStorage, SCHEMA_SQL};
pub use storage::Storage;
