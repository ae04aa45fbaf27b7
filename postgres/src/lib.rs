//! # Seckill Postgres
//!
//! `PostgreSQL` implementations of the relational side of the pipeline: the
//! voucher listings and the committed order rows. It uses sqlx with the
//! tokio runtime and plain connection pooling.
//!
//! The relational store is the source of truth. The coordination store's
//! cached counter admits requests, but only [`PostgresOrderStore`] commits
//! them, re-checking uniqueness and stock inside one transaction.
//!
//! # Example
//!
//! ```ignore
//! use seckill_postgres::{PostgresOrderStore, PostgresVoucherStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = seckill_postgres::connect("postgres://localhost/seckill").await?;
//!     seckill_postgres::run_migrations(&pool).await?;
//!     let orders = PostgresOrderStore::new(pool.clone());
//!     let vouchers = PostgresVoucherStore::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Public modules
pub mod orders;
pub mod vouchers;

// Re-export main types for convenience
pub use orders::PostgresOrderStore;
pub use vouchers::PostgresVoucherStore;

use seckill_core::{Error, Result};
use sqlx::PgPool;

/// Open a connection pool to the given database URL.
///
/// # Errors
///
/// Returns [`Error::Database`] if the pool cannot be created.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPool::connect(database_url)
        .await
        .map_err(|e| Error::Database(format!("failed to connect to Postgres: {e}")))
}

/// Create the tables this crate reads and writes.
///
/// Idempotent; safe to run at every startup.
///
/// # Errors
///
/// Returns [`Error::Database`] if any statement fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS seckill_vouchers (
            voucher_id BIGINT PRIMARY KEY,
            stock BIGINT NOT NULL,
            begin_time TIMESTAMPTZ NOT NULL,
            end_time TIMESTAMPTZ NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .map_err(|e| Error::Database(format!("failed to create seckill_vouchers: {e}")))?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS voucher_orders (
            id BIGINT PRIMARY KEY,
            user_id BIGINT NOT NULL,
            voucher_id BIGINT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            CONSTRAINT voucher_orders_user_voucher UNIQUE (user_id, voucher_id)
        )
        ",
    )
    .execute(pool)
    .await
    .map_err(|e| Error::Database(format!("failed to create voucher_orders: {e}")))?;

    tracing::info!("seckill schema ready");
    Ok(())
}

/// Map a sqlx failure into the crate error taxonomy.
fn db_error(e: &sqlx::Error) -> Error {
    Error::Database(e.to_string())
}
