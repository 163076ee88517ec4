//! KV Service Client (KVC): a typed, cancellation-safe wrapper over the
//! external Redis-compatible data service that acts as the crawler's
//! system of record for frontier state, visited records, and the
//! approximate-membership filter.
//!
//! `KvClient` is the single pooled-connection type; the orchestrator
//! constructs two independent instances against the same Redis URL — a
//! "text" client for hash/sorted-set/membership operations and a
//! "binary" client dedicated to the fetch queue's bincode-serialized
//! tuples — so their pool occupancy (created/in-use/available) can be
//! reported separately in metrics.

mod bloom;
mod fetch_queue;
mod pool;

pub use bloom::BloomFilter;
pub use fetch_queue::FetchQueueEntry;
pub use pool::PoolStats;

use pool::{Pool, PoolError};
use redis::AsyncCommands;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvcError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("encoding error: {0}")]
    Encoding(#[from] Box<bincode::ErrorKind>),
}

/// Typed wrapper over the pooled Redis connection. Every method
/// acquires a connection, runs one round-trip, and marks the
/// connection healthy only once that round-trip has fully completed —
/// see [`pool::PooledConnection`] for why that ordering matters.
pub struct KvClient {
    pool: Pool,
}

impl KvClient {
    pub fn new(redis_url: &str, pool_size: usize) -> Result<Self, KvcError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { pool: Pool::new(client, pool_size) })
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<Option<String>> = conn.as_mut().hget(key, field).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<()> = conn.as_mut().hset(key, field, value).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<bool> = conn.as_mut().hset_nx(key, field, value).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<Vec<Option<String>>> = conn.as_mut().hget(key, fields).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<Vec<(String, String)>> = conn.as_mut().hgetall(key).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// `HDEL key field1 field2 ...` — no-op for fields that don't
    /// exist. Used to clear stale optional fields on overwrite rather
    /// than leaving a previous visit's value behind.
    pub async fn hdel(&self, key: &str, fields: &[&str]) -> Result<(), KvcError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<()> = conn.as_mut().hdel(key, fields).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<i64> = conn.as_mut().hincr(key, field, delta).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// `HSET key field1 value1 field2 value2 ...` — sets several fields
    /// of one hash in a single round-trip.
    pub async fn hmset(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<()> = conn.as_mut().hset_multiple(key, fields).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn lpop(&self, key: &str) -> Result<Option<Vec<u8>>, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<Option<Vec<u8>>> =
            conn.as_mut().lpop(key, None).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// `ZADD key score member`, `NX`-style only-if-absent variant via
    /// `zadd` (plain) — callers that need conditional insertion use
    /// [`KvClient::zadd_nx`].
    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<()> = conn.as_mut().zadd(key, member, score).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn zadd_nx(&self, key: &str, member: &str, score: f64) -> Result<bool, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<i64> = redis::cmd("ZADD")
            .arg(key)
            .arg("NX")
            .arg(score)
            .arg(member)
            .query_async(conn.as_mut())
            .await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result? > 0)
    }

    /// `ZPOPMIN key` — atomically removes and returns the
    /// lowest-scored member, used for the frontier's per-domain claim.
    pub async fn zpopmin(&self, key: &str) -> Result<Option<(String, f64)>, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<Vec<(String, f64)>> = conn.as_mut().zpopmin(key, 1).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?.into_iter().next())
    }

    pub async fn zcard(&self, key: &str) -> Result<i64, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<i64> = conn.as_mut().zcard(key).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// `ZRANGE key start stop` — used by diagnostics/tests to inspect
    /// the ready set without popping from it.
    pub async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<Vec<String>> = conn.as_mut().zrange(key, start, stop).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn zrem(&self, key: &str, member: &str) -> Result<(), KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<()> = conn.as_mut().zrem(key, member).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// `DBSIZE` — surfaced in periodic metrics as a coarse measure of
    /// total KVC key count.
    pub async fn dbsize(&self) -> Result<i64, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<i64> = redis::cmd("DBSIZE").query_async(conn.as_mut()).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// `LASTSAVE` — epoch seconds of the last successful background
    /// snapshot, surfaced for operational visibility into the store's
    /// snapshot/append-only-log durability story.
    pub async fn lastsave(&self) -> Result<i64, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<i64> = redis::cmd("LASTSAVE").query_async(conn.as_mut()).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// `INFO` — raw server info text, used for diagnostics rather than
    /// parsed into a typed struct.
    pub async fn info(&self) -> Result<String, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<String> = redis::cmd("INFO").query_async(conn.as_mut()).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// Pool occupancy for metrics: `(created, in_use, available)`.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<(), KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<()> = conn.as_mut().rpush(key, value).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// `BLPOP key timeout_seconds`. Returns `None` on timeout so the
    /// caller can re-check a shutdown flag instead of blocking forever.
    pub async fn blpop(&self, key: &str, timeout_seconds: f64) -> Result<Option<Vec<u8>>, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<Option<(String, Vec<u8>)>> =
            conn.as_mut().blpop(key, timeout_seconds).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?.map(|(_, value)| value))
    }

    pub async fn llen(&self, key: &str) -> Result<i64, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<i64> = conn.as_mut().llen(key).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    pub async fn setbit(&self, key: &str, offset: usize, value: bool) -> Result<(), KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<bool> = conn.as_mut().setbit(key, offset, value).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result.map(|_| ())?)
    }

    pub async fn getbit(&self, key: &str, offset: usize) -> Result<bool, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let result: redis::RedisResult<bool> = conn.as_mut().getbit(key, offset).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// Runs `offsets.len()` `GETBIT` calls in one pipelined round-trip.
    pub async fn getbit_many(&self, key: &str, offsets: &[usize]) -> Result<Vec<bool>, KvcError> {
        let mut conn = self.pool.acquire().await?;
        let mut pipe = redis::pipe();
        for &offset in offsets {
            pipe.cmd("GETBIT").arg(key).arg(offset);
        }
        let result: redis::RedisResult<Vec<bool>> = pipe.query_async(conn.as_mut()).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }

    /// Runs `offsets.len()` `SETBIT key offset 1` calls in one
    /// pipelined round-trip.
    pub async fn setbit_many(&self, key: &str, offsets: &[usize]) -> Result<(), KvcError> {
        let mut conn = self.pool.acquire().await?;
        let mut pipe = redis::pipe();
        for &offset in offsets {
            pipe.cmd("SETBIT").arg(key).arg(offset).arg(1);
        }
        let result: redis::RedisResult<()> = pipe.query_async(conn.as_mut()).await;
        if result.is_ok() {
            conn.mark_healthy();
        }
        Ok(result?)
    }
}
