//! Relational-store traits: voucher listings and committed orders.
//!
//! `create_order` is the pipeline's transactional unit of work: uniqueness
//! re-check, conditional stock decrement and order insert execute inside one
//! store transaction, and the outcome enum tells the materializer which path
//! was taken so it can log and count accordingly.

use std::future::Future;

use crate::error::Result;
use crate::types::{SeckillVoucher, UserId, VoucherId, VoucherOrder};

/// Result of one order-creation unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCreation {
    /// Stock decremented and the row inserted.
    Created,
    /// A committed order already exists for `(user_id, voucher_id)`;
    /// nothing was written. The redelivery no-op path.
    AlreadyExists,
    /// The conditional decrement matched no row: relational stock was
    /// already exhausted. Nothing was written; the admission-layer counter
    /// has diverged from relational stock.
    StockExhausted,
}

impl OrderCreation {
    /// Stable label for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyExists => "already_exists",
            Self::StockExhausted => "stock_exhausted",
        }
    }
}

/// Committed order persistence.
pub trait OrderStore: Send + Sync {
    /// Execute the order-creation transactional unit:
    ///
    /// 1. if an order for `(order.user_id, order.voucher_id)` exists,
    ///    return [`OrderCreation::AlreadyExists`];
    /// 2. conditionally decrement voucher stock
    ///    (`stock = stock - 1` only while `stock > 0`); zero affected rows
    ///    → [`OrderCreation::StockExhausted`], nothing persisted;
    /// 3. insert the order row and return [`OrderCreation::Created`].
    ///
    /// All three steps commit or roll back together.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Database`] on store failure; the
    /// transaction never partially applies.
    fn create_order(&self, order: &VoucherOrder)
        -> impl Future<Output = Result<OrderCreation>> + Send;

    /// Look up a committed order by its uniqueness key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Database`] on store failure.
    fn find_by_user_and_voucher(
        &self,
        user_id: UserId,
        voucher_id: VoucherId,
    ) -> impl Future<Output = Result<Option<VoucherOrder>>> + Send;
}

/// Voucher listing persistence (the relational source of truth for stock).
pub trait VoucherStore: Send + Sync {
    /// Persist a new seckill listing with its initial stock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Database`] on store failure.
    fn insert_voucher(
        &self,
        voucher: &SeckillVoucher,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remaining relational stock for a voucher, `None` when unlisted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Database`] on store failure.
    fn remaining_stock(
        &self,
        voucher_id: VoucherId,
    ) -> impl Future<Output = Result<Option<i64>>> + Send;
}
