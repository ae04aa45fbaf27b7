//! Atomic admission against Redis.
//!
//! The whole per-request decision is a single Lua script, so no interleaving
//! of concurrent purchasers can observe or create partial state: stock is
//! checked and decremented, the buyer recorded and the order appended to the
//! durable log in one indivisible evaluation.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use seckill_core::keys::{self, ORDERS_STREAM};
use seckill_core::{AdmissionGate, AdmissionOutcome, Error, OrderId, Result, UserId, VoucherId};

/// Admission decision script.
///
/// KEYS: stock counter, buyer set, order log.
/// ARGV: voucher id, user id, order id.
/// Returns the admission code: 0 admitted, 1 voucher unknown, 2 out of
/// stock, 3 duplicate order.
const ADMIT_SCRIPT: &str = r"
if redis.call('exists', KEYS[1]) == 0 then
    return 1
end
if tonumber(redis.call('get', KEYS[1])) <= 0 then
    return 2
end
if redis.call('sismember', KEYS[2], ARGV[2]) == 1 then
    return 3
end
redis.call('incrby', KEYS[1], -1)
redis.call('sadd', KEYS[2], ARGV[2])
redis.call('xadd', KEYS[3], '*', 'orderId', ARGV[3], 'userId', ARGV[2], 'voucherId', ARGV[1])
return 0
";

/// Redis-backed [`AdmissionGate`].
///
/// # Example
///
/// ```no_run
/// use seckill_core::{AdmissionGate, OrderId, UserId, VoucherId};
/// use seckill_redis::RedisAdmissionGate;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gate = RedisAdmissionGate::new("redis://127.0.0.1:6379").await?;
/// gate.seed_stock(VoucherId::new(10), 100).await?;
///
/// let outcome = gate
///     .admit(VoucherId::new(10), UserId::new(42), OrderId::new(1))
///     .await?;
/// assert!(outcome.is_admitted());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisAdmissionGate {
    conn_manager: ConnectionManager,
    script: Arc<redis::Script>,
    stream: String,
}

impl RedisAdmissionGate {
    /// Create a gate appending admitted orders to the default log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the connection cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let conn_manager = crate::connect(redis_url).await?;
        Ok(Self {
            conn_manager,
            script: Arc::new(redis::Script::new(ADMIT_SCRIPT)),
            stream: ORDERS_STREAM.to_owned(),
        })
    }

    /// Append admitted orders to a different log key.
    #[must_use]
    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }
}

impl AdmissionGate for RedisAdmissionGate {
    async fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<AdmissionOutcome> {
        let mut conn = self.conn_manager.clone();
        let code: i64 = self
            .script
            .key(keys::stock_key(voucher_id))
            .key(keys::buyers_key(voucher_id))
            .key(&self.stream)
            .arg(voucher_id.value())
            .arg(user_id.value())
            .arg(order_id.value())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::Store(format!("admission script failed: {e}")))?;

        let outcome = AdmissionOutcome::from_code(code)?;
        tracing::debug!(
            voucher_id = %voucher_id,
            user_id = %user_id,
            outcome = outcome.as_str(),
            "admission decided"
        );
        Ok(outcome)
    }

    async fn seed_stock(&self, voucher_id: VoucherId, stock: i64) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .set(keys::stock_key(voucher_id), stock)
            .await
            .map_err(|e| Error::Store(format!("failed to seed stock counter: {e}")))?;
        tracing::info!(voucher_id = %voucher_id, stock, "stock counter seeded");
        Ok(())
    }
}
