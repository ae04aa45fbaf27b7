//! Identifier generation sequenced by Redis.
//!
//! The store contributes only the per-day sequence counter (an atomic
//! `INCR`); the time prefix and bit assembly are shared layout helpers from
//! `seckill-core`, so identifiers from any process interleave correctly.

use std::sync::Arc;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use seckill_core::id::{compose_id, epoch_seconds};
use seckill_core::keys::daily_counter_key;
use seckill_core::{Clock, Error, IdGenerator, Result, SystemClock};

/// Redis-backed [`IdGenerator`].
///
/// Issued identifiers are unique across every process sharing the store and
/// increase with time within a business key.
#[derive(Clone)]
pub struct RedisIdGenerator<C = SystemClock> {
    conn_manager: ConnectionManager,
    clock: Arc<C>,
}

impl RedisIdGenerator<SystemClock> {
    /// Create a generator on the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::with_clock(redis_url, Arc::new(SystemClock)).await
    }
}

impl<C: Clock> RedisIdGenerator<C> {
    /// Create a generator on an injected clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the connection cannot be established.
    pub async fn with_clock(redis_url: &str, clock: Arc<C>) -> Result<Self> {
        let conn_manager = crate::connect(redis_url).await?;
        Ok(Self {
            conn_manager,
            clock,
        })
    }
}

impl<C: Clock> IdGenerator for RedisIdGenerator<C> {
    async fn next_id(&self, business_key: &str) -> Result<i64> {
        let mut conn = self.conn_manager.clone();
        let now = self.clock.now();
        let counter_key = daily_counter_key(business_key, now.date_naive());

        let sequence: i64 = conn
            .incr(&counter_key, 1)
            .await
            .map_err(|e| Error::Store(format!("failed to increment daily counter: {e}")))?;

        Ok(compose_id(epoch_seconds(now), sequence))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use seckill_core::id::sequence_of;

    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    const REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn concurrent_callers_never_collide() {
        let generator = Arc::new(RedisIdGenerator::new(REDIS_URL).await.unwrap());
        let business_key = format!("test:{}", uuid::Uuid::new_v4());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let generator = Arc::clone(&generator);
            let business_key = business_key.clone();
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::with_capacity(50);
                for _ in 0..50 {
                    ids.push(generator.next_id(&business_key).await.unwrap());
                }
                ids
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(all.insert(id), "identifier {id} issued twice");
            }
        }
        assert_eq!(all.len(), 400);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn sequences_start_at_one_per_day() {
        let generator = RedisIdGenerator::new(REDIS_URL).await.unwrap();
        let business_key = format!("test:{}", uuid::Uuid::new_v4());

        let id = generator.next_id(&business_key).await.unwrap();
        assert_eq!(sequence_of(id), 1);
        let id = generator.next_id(&business_key).await.unwrap();
        assert_eq!(sequence_of(id), 2);
    }
}
