//! Distributed locks on Redis.
//!
//! Acquisition is a single `SET key owner NX EX ttl`, so the value and the
//! expiry appear atomically. Release runs a compare-and-delete script: the
//! key is deleted only while it still holds this acquisition's owner token,
//! which makes a delayed release harmless after the TTL has let someone
//! else in.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use redis::aio::ConnectionManager;

use seckill_core::{Error, LockProvider, LockToken, Result};

/// Owner-checked release script.
///
/// KEYS: lock key. ARGV: owner token.
/// Returns 1 when the lock was released, 0 when it was no longer ours.
const UNLOCK_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
end
return 0
";

/// Redis-backed [`LockProvider`].
///
/// Owner tokens are `{clientId}-{sequence}`: the client id is one UUID per
/// provider instance and the sequence increments per acquisition, so no two
/// acquisitions anywhere share a token.
#[derive(Clone)]
pub struct RedisLockProvider {
    conn_manager: ConnectionManager,
    unlock_script: Arc<redis::Script>,
    client_id: String,
    sequence: Arc<AtomicU64>,
}

impl RedisLockProvider {
    /// Create a lock provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let conn_manager = crate::connect(redis_url).await?;
        Ok(Self {
            conn_manager,
            unlock_script: Arc::new(redis::Script::new(UNLOCK_SCRIPT)),
            client_id: uuid::Uuid::new_v4().to_string(),
            sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    fn next_owner(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{sequence}", self.client_id)
    }
}

impl LockProvider for RedisLockProvider {
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let mut conn = self.conn_manager.clone();
        let owner = self.next_owner();
        let ttl_secs = ttl.as_secs().max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&owner)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("failed to acquire lock {key}: {e}")))?;

        Ok(reply.map(|_| LockToken::new(key.to_owned(), owner)))
    }

    async fn unlock(&self, token: LockToken) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let deleted: i64 = self
            .unlock_script
            .key(token.key())
            .arg(token.owner())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("failed to release lock {}: {e}", token.key())))?;

        if deleted == 0 {
            tracing::debug!(key = token.key(), "lock expired or re-acquired, nothing released");
        }
        Ok(())
    }
}
