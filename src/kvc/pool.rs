//! Bounded, cancellation-safe blocking connection pool.
//!
//! Socket-level keepalive (idle 120s, interval 20s, fail count 5) is
//! not configurable through the `redis` crate's async connection
//! builder; dead peers are instead detected by the combination of the
//! fetch-side `read_timeout`/`connect_timeout` and this pool's own
//! cancellation-closes-don't-recycle rule, which keeps a half-dead
//! connection from ever being handed to a second caller.
//!
//! Sized by a [`Semaphore`] so acquisition blocks rather than failing
//! with "too many connections" once the pool is saturated. A checked-out
//! [`PooledConnection`] starts pessimistic: it assumes the connection
//! will be left mid-protocol until [`PooledConnection::mark_healthy`] is
//! called after a full round-trip completes. If the calling future is
//! cancelled (a `tokio::select!` branch loses, a timeout fires) partway
//! through an operation, `Drop` sees the connection still marked
//! unhealthy and closes it instead of returning a connection that might
//! be holding a half-written request or half-read reply to the pool for
//! the next borrower to inherit.

use redis::aio::Connection;
use redis::Client;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("redis connection error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Snapshot of pool occupancy for the KVC metrics export: every
/// connection is either idle ("available"), checked out ("in use"), or
/// not yet opened; `created` is `in_use + available` by construction.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub created: usize,
    pub in_use: usize,
    pub available: usize,
    pub max_connections: usize,
}

pub struct Pool {
    client: Client,
    idle: Arc<Mutex<VecDeque<Connection>>>,
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl Pool {
    pub fn new(client: Client, size: usize) -> Self {
        Self {
            client,
            idle: Arc::new(Mutex::new(VecDeque::with_capacity(size))),
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Acquires a connection, blocking until one is idle or a new one
    /// can be opened under the pool's size limit. Transient connection
    /// errors are retried with jittered exponential backoff (base 50ms,
    /// doubling, capped at 5 attempts) before being propagated.
    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore never closed");

        let existing = self.idle.lock().await.pop_front();
        let conn = match existing {
            Some(conn) => conn,
            None => self.open_with_retry().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            idle: self.idle.clone(),
            healthy: false,
            _permit: permit,
        })
    }

    async fn open_with_retry(&self) -> Result<Connection, PoolError> {
        const MAX_ATTEMPTS: u32 = 5;
        const BASE_DELAY_MS: u64 = 50;

        let mut attempt = 0;
        loop {
            match self.client.get_async_connection().await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt + 1 < MAX_ATTEMPTS => {
                    let backoff_ms = BASE_DELAY_MS * 2u64.pow(attempt);
                    let jitter = 1.0 + (jitter_fraction() - 0.5) * 0.2;
                    let delay_ms = (backoff_ms as f64 * jitter).max(0.0) as u64;
                    tracing::warn!(attempt, error = %e, "kvc connection open failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// `(created, in_use, available)` — `created` is reconstructed as
    /// `in_use + available` since this pool never holds more open
    /// connections than it has outstanding permits plus idle entries.
    pub fn stats(&self) -> PoolStats {
        let available = self.idle.try_lock().map(|g| g.len()).unwrap_or(0);
        let in_use = self.size.saturating_sub(self.semaphore.available_permits());
        PoolStats {
            created: in_use + available,
            in_use,
            available,
            max_connections: self.size,
        }
    }
}

/// `rand::random` in `[0, 1)`, pulled out as its own call so jitter
/// doesn't need a `ThreadRng` held across an `.await`.
fn jitter_fraction() -> f64 {
    rand::random::<f64>()
}

pub struct PooledConnection {
    conn: Option<Connection>,
    idle: Arc<Mutex<VecDeque<Connection>>>,
    healthy: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn as_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken only on drop")
    }

    /// Marks the connection safe to return to the pool. Call this only
    /// after an operation has fully completed (request written, full
    /// reply read) — never before awaiting the reply.
    pub fn mark_healthy(&mut self) {
        self.healthy = true;
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !self.healthy {
            // Hard close: drop the connection outright instead of
            // recycling one that may be mid-request or mid-reply.
            return;
        }
        if let Ok(mut idle) = self.idle.try_lock() {
            idle.push_back(conn);
        }
        // If the idle queue is contended, drop the connection rather
        // than block in Drop; the pool opens a fresh one on next use.
    }
}
