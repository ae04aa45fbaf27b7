//! Flash-sale entry point: identifier issuance plus atomic admission.
//!
//! The service performs no durable writes of its own. A successful call
//! means the coordination store has reserved stock, marked the buyer, and
//! appended the order record to the durable log; the relational row appears
//! asynchronously once the consumer drains the log.

use std::sync::Arc;

use crate::admission::AdmissionGate;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::id::{IdGenerator, ORDER_BUSINESS_KEY};
use crate::orders::VoucherStore;
use crate::types::{OrderId, RequestContext, SeckillVoucher, VoucherId};

/// Orchestrates voucher publication and purchase admission.
pub struct SeckillService<G, I, V, C> {
    gate: Arc<G>,
    ids: Arc<I>,
    vouchers: Arc<V>,
    clock: Arc<C>,
}

impl<G, I, V, C> SeckillService<G, I, V, C>
where
    G: AdmissionGate,
    I: IdGenerator,
    V: VoucherStore,
    C: Clock,
{
    /// Create a service over the given collaborators.
    pub const fn new(gate: Arc<G>, ids: Arc<I>, vouchers: Arc<V>, clock: Arc<C>) -> Self {
        Self {
            gate,
            ids,
            vouchers,
            clock,
        }
    }

    /// Attempt to purchase one unit of a flash-sale voucher.
    ///
    /// Returns the order identifier on admission. The identifier is issued
    /// before admission runs, so identifiers of rejected attempts are
    /// simply never used.
    ///
    /// # Errors
    ///
    /// [`Error::VoucherNotFound`], [`Error::OutOfStock`] and
    /// [`Error::DuplicateOrder`] report rejection; [`Error::Store`] reports
    /// a coordination-store failure and can be retried.
    pub async fn request_seckill(
        &self,
        ctx: &RequestContext,
        voucher_id: VoucherId,
    ) -> Result<OrderId> {
        let order_id = OrderId::new(self.ids.next_id(ORDER_BUSINESS_KEY).await?);
        let outcome = self.gate.admit(voucher_id, ctx.user_id, order_id).await?;
        metrics::counter!("seckill_admissions_total", "outcome" => outcome.as_str()).increment(1);

        match outcome.rejection() {
            None => {
                tracing::info!(
                    user_id = %ctx.user_id,
                    voucher_id = %voucher_id,
                    order_id = %order_id,
                    "order admitted"
                );
                Ok(order_id)
            },
            Some(reason) => {
                tracing::debug!(
                    user_id = %ctx.user_id,
                    voucher_id = %voucher_id,
                    outcome = outcome.as_str(),
                    "admission rejected"
                );
                Err(reason)
            },
        }
    }

    /// Publish a voucher listing and seed its cached stock counter.
    ///
    /// The relational row is written first so the counter never refers to a
    /// listing that does not exist.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidVoucher`] when the sale window or stock is invalid;
    /// [`Error::Database`] / [`Error::Store`] on persistence failures.
    pub async fn publish_voucher(&self, voucher: &SeckillVoucher) -> Result<()> {
        if voucher.begin_time >= voucher.end_time {
            return Err(Error::InvalidVoucher(
                "sale window must end after it begins".to_owned(),
            ));
        }
        if voucher.end_time <= self.clock.now() {
            return Err(Error::InvalidVoucher(
                "sale window has already ended".to_owned(),
            ));
        }
        if voucher.stock < 1 {
            return Err(Error::InvalidVoucher(format!(
                "stock must be at least 1, got {}",
                voucher.stock
            )));
        }

        self.vouchers.insert_voucher(voucher).await?;
        self.gate.seed_stock(voucher.voucher_id, voucher.stock).await?;
        tracing::info!(
            voucher_id = %voucher.voucher_id,
            stock = voucher.stock,
            "voucher published"
        );
        Ok(())
    }
}
