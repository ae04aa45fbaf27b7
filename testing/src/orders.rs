//! In-memory relational store.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use seckill_core::{
    Error, OrderCreation, OrderStore, Result, SeckillVoucher, UserId, VoucherId, VoucherOrder,
    VoucherStore,
};

#[derive(Default)]
struct Inner {
    vouchers: HashMap<VoucherId, SeckillVoucher>,
    orders: Vec<VoucherOrder>,
    fail_next_creates: u32,
}

/// In-memory stand-in for the relational store.
///
/// Implements [`VoucherStore`] and [`OrderStore`] with the same semantics
/// as the Postgres implementation: order creation re-checks uniqueness,
/// conditionally decrements stock and inserts, all under one lock. Clones
/// share state.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed order rows.
    #[must_use]
    pub fn orders_len(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }

    /// Snapshot of every committed order row.
    #[must_use]
    pub fn all_orders(&self) -> Vec<VoucherOrder> {
        self.inner.lock().unwrap().orders.clone()
    }

    /// Overwrite a listing's relational stock.
    ///
    /// For forcing divergence between the cached counter and the relational
    /// truth. Panics if the voucher was never inserted.
    pub fn set_stock(&self, voucher_id: VoucherId, stock: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .vouchers
            .get_mut(&voucher_id)
            .expect("voucher must be inserted before set_stock")
            .stock = stock;
    }

    /// Make the next `count` order creations fail with a database error.
    pub fn fail_next_creates(&self, count: u32) {
        self.inner.lock().unwrap().fail_next_creates = count;
    }
}

impl VoucherStore for InMemoryOrderStore {
    async fn insert_voucher(&self, voucher: &SeckillVoucher) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.vouchers.contains_key(&voucher.voucher_id) {
            return Err(Error::Database(format!(
                "voucher {} already listed",
                voucher.voucher_id
            )));
        }
        inner.vouchers.insert(voucher.voucher_id, *voucher);
        Ok(())
    }

    async fn remaining_stock(&self, voucher_id: VoucherId) -> Result<Option<i64>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .vouchers
            .get(&voucher_id)
            .map(|voucher| voucher.stock))
    }
}

impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: &VoucherOrder) -> Result<OrderCreation> {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_next_creates > 0 {
            inner.fail_next_creates -= 1;
            return Err(Error::Database("injected create failure".to_owned()));
        }

        if inner
            .orders
            .iter()
            .any(|existing| {
                existing.user_id == order.user_id && existing.voucher_id == order.voucher_id
            })
        {
            return Ok(OrderCreation::AlreadyExists);
        }

        match inner.vouchers.get_mut(&order.voucher_id) {
            Some(voucher) if voucher.stock > 0 => voucher.stock -= 1,
            _ => return Ok(OrderCreation::StockExhausted),
        }

        inner.orders.push(*order);
        Ok(OrderCreation::Created)
    }

    async fn find_by_user_and_voucher(
        &self,
        user_id: UserId,
        voucher_id: VoucherId,
    ) -> Result<Option<VoucherOrder>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .orders
            .iter()
            .find(|order| order.user_id == user_id && order.voucher_id == voucher_id)
            .copied())
    }
}
