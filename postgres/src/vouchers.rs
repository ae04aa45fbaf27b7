//! Voucher listing rows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use seckill_core::{Result, SeckillVoucher, VoucherId, VoucherStore};

use crate::db_error;

/// `PostgreSQL`-backed [`VoucherStore`].
///
/// Holds the `seckill_vouchers` table: one row per listing, with the
/// authoritative remaining stock.
pub struct PostgresVoucherStore {
    pool: PgPool,
}

impl PostgresVoucherStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a full listing row. Not part of the hot path; used by setup
    /// and reconciliation tooling.
    ///
    /// # Errors
    ///
    /// Returns [`seckill_core::Error::Database`] if the query fails.
    pub async fn find_voucher(&self, voucher_id: VoucherId) -> Result<Option<SeckillVoucher>> {
        let row: Option<(i64, i64, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r"
            SELECT voucher_id, stock, begin_time, end_time
            FROM seckill_vouchers
            WHERE voucher_id = $1
            ",
        )
        .bind(voucher_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        Ok(row.map(|(id, stock, begin_time, end_time)| {
            SeckillVoucher::new(VoucherId::new(id), stock, begin_time, end_time)
        }))
    }
}

impl VoucherStore for PostgresVoucherStore {
    async fn insert_voucher(&self, voucher: &SeckillVoucher) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO seckill_vouchers (voucher_id, stock, begin_time, end_time)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(voucher.voucher_id.value())
        .bind(voucher.stock)
        .bind(voucher.begin_time)
        .bind(voucher.end_time)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(&e))?;

        tracing::info!(
            voucher_id = %voucher.voucher_id,
            stock = voucher.stock,
            "voucher listing inserted"
        );
        Ok(())
    }

    async fn remaining_stock(&self, voucher_id: VoucherId) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT stock FROM seckill_vouchers WHERE voucher_id = $1")
                .bind(voucher_id.value())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error(&e))?;

        Ok(row.map(|(stock,)| stock))
    }
}
