//! Committed order rows and the order-creation transactional unit.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use seckill_core::{
    OrderCreation, OrderId, OrderStore, Result, UserId, VoucherId, VoucherOrder,
};

use crate::db_error;

/// `PostgreSQL`-backed [`OrderStore`].
///
/// `create_order` is the single transactional unit of the materialization
/// path: the duplicate re-check, the conditional stock decrement and the
/// row insert commit together or not at all.
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for PostgresOrderStore {
    async fn create_order(&self, order: &VoucherOrder) -> Result<OrderCreation> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error(&e))?;

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM voucher_orders WHERE user_id = $1 AND voucher_id = $2",
        )
        .bind(order.user_id.value())
        .bind(order.voucher_id.value())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error(&e))?;

        if existing.is_some() {
            tx.rollback().await.map_err(|e| db_error(&e))?;
            return Ok(OrderCreation::AlreadyExists);
        }

        let decremented = sqlx::query(
            r"
            UPDATE seckill_vouchers
            SET stock = stock - 1
            WHERE voucher_id = $1 AND stock > 0
            ",
        )
        .bind(order.voucher_id.value())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error(&e))?;

        if decremented.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| db_error(&e))?;
            return Ok(OrderCreation::StockExhausted);
        }

        let inserted = sqlx::query(
            r"
            INSERT INTO voucher_orders (id, user_id, voucher_id, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(order.id.value())
        .bind(order.user_id.value())
        .bind(order.voucher_id.value())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            // A concurrent transaction slipped past the re-check; the unique
            // constraint is the last word. Rolling back restores the stock.
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                tx.rollback().await.map_err(|e| db_error(&e))?;
                return Ok(OrderCreation::AlreadyExists);
            }
            return Err(db_error(&e));
        }

        tx.commit().await.map_err(|e| db_error(&e))?;
        tracing::debug!(
            order_id = %order.id,
            user_id = %order.user_id,
            voucher_id = %order.voucher_id,
            "order row committed"
        );
        Ok(OrderCreation::Created)
    }

    async fn find_by_user_and_voucher(
        &self,
        user_id: UserId,
        voucher_id: VoucherId,
    ) -> Result<Option<VoucherOrder>> {
        let row: Option<(i64, i64, i64, DateTime<Utc>)> = sqlx::query_as(
            r"
            SELECT id, user_id, voucher_id, created_at
            FROM voucher_orders
            WHERE user_id = $1 AND voucher_id = $2
            ",
        )
        .bind(user_id.value())
        .bind(voucher_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        Ok(row.map(|(id, user, voucher, created_at)| {
            VoucherOrder::new(
                OrderId::new(id),
                UserId::new(user),
                VoucherId::new(voucher),
                created_at,
            )
        }))
    }
}
