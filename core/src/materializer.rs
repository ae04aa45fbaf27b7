//! Order materialization: durable persistence of an admitted order.
//!
//! Materialization runs under a per-user distributed lock. The lock covers
//! races the admission script cannot see, such as the same record being
//! replayed by crash recovery while another consumer instance still holds
//! the original delivery. Contention therefore means a concurrent attempt
//! for the same user is already in flight, and the losing side drops its
//! attempt.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::Result;
use crate::keys;
use crate::lock::LockProvider;
use crate::orders::{OrderCreation, OrderStore};
use crate::types::OrderRecord;

/// Tuning for the materializer.
#[derive(Debug, Clone)]
pub struct MaterializerConfig {
    /// TTL for the per-user order lock.
    ///
    /// Default: 10 seconds, which bounds how long a crashed holder can
    /// block the key.
    pub lock_ttl: Duration,
}

impl MaterializerConfig {
    /// Create the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock_ttl: Duration::from_secs(10),
        }
    }

    /// Set the per-user lock TTL.
    #[must_use]
    pub const fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Persists queued order records as committed order rows, idempotently.
pub struct OrderMaterializer<S, L, C> {
    orders: Arc<S>,
    locks: Arc<L>,
    clock: Arc<C>,
    config: MaterializerConfig,
}

impl<S, L, C> OrderMaterializer<S, L, C>
where
    S: OrderStore,
    L: LockProvider,
    C: Clock,
{
    /// Create a materializer with the default configuration.
    pub fn new(orders: Arc<S>, locks: Arc<L>, clock: Arc<C>) -> Self {
        Self {
            orders,
            locks,
            clock,
            config: MaterializerConfig::default(),
        }
    }

    /// Override the configuration.
    #[must_use]
    pub fn with_config(mut self, config: MaterializerConfig) -> Self {
        self.config = config;
        self
    }

    /// Materialize one order record.
    ///
    /// Idempotent: a record whose order is already committed is a no-op.
    /// Lock contention is also a no-op; a concurrent attempt for the same
    /// user is already materializing, and admission has already ruled out
    /// distinct orders for the same `(user, voucher)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Database`] or
    /// [`crate::error::Error::Store`] on infrastructure failure; callers
    /// must not acknowledge the delivery in that case, so it is replayed.
    pub async fn materialize(&self, record: &OrderRecord) -> Result<()> {
        let lock_key = keys::order_lock_key(record.user_id);

        let Some(token) = self.locks.try_lock(&lock_key, self.config.lock_ttl).await? else {
            metrics::counter!("seckill_lock_contention_total").increment(1);
            tracing::warn!(
                user_id = %record.user_id,
                order_id = %record.order_id,
                "order lock contended, dropping concurrent materialization attempt"
            );
            return Ok(());
        };

        let result = self.create(record).await;

        // Held locks are released on every path; TTL covers a crash.
        if let Err(err) = self.locks.unlock(token).await {
            tracing::warn!(key = %lock_key, error = %err, "failed to release order lock");
        }

        result
    }

    async fn create(&self, record: &OrderRecord) -> Result<()> {
        let order = record.to_order(self.clock.now());

        match self.orders.create_order(&order).await? {
            OrderCreation::Created => {
                metrics::counter!("seckill_orders_materialized_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    user_id = %order.user_id,
                    voucher_id = %order.voucher_id,
                    "order materialized"
                );
            },
            OrderCreation::AlreadyExists => {
                metrics::counter!("seckill_orders_duplicate_total").increment(1);
                tracing::debug!(
                    order_id = %order.id,
                    user_id = %order.user_id,
                    "order already committed, skipping redelivery"
                );
            },
            OrderCreation::StockExhausted => {
                metrics::counter!("seckill_stock_divergence_total").increment(1);
                tracing::error!(
                    order_id = %order.id,
                    user_id = %order.user_id,
                    voucher_id = %order.voucher_id,
                    "relational stock exhausted for admitted order, abandoning for reconciliation"
                );
            },
        }

        Ok(())
    }
}
