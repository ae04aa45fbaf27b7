//! Contention tests: many callers racing for limited stock.
//!
//! The admission gate must hold its guarantees under arbitrary
//! interleavings, so these tests hammer it from many tasks at once and
//! assert on the exact aggregate outcome.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code asserts on exact outcomes

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use seckill_core::{
    ConsumerConfig, Error, OrderConsumer, OrderMaterializer, RequestContext, SeckillService,
    SeckillVoucher, UserId, VoucherId, VoucherStore, WorkerPool, WorkerPoolConfig,
};
use seckill_testing::{FixedClock, InMemoryCoordinationStore, InMemoryOrderStore};

type Service =
    SeckillService<InMemoryCoordinationStore, InMemoryCoordinationStore, InMemoryOrderStore, FixedClock>;

fn pipeline() -> (Arc<Service>, InMemoryCoordinationStore, InMemoryOrderStore, Arc<FixedClock>) {
    seckill_testing::init_test_tracing();
    let clock = Arc::new(FixedClock::default());
    let store = InMemoryCoordinationStore::with_clock(clock.clone());
    let orders = InMemoryOrderStore::new();
    let service = Arc::new(SeckillService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(orders.clone()),
        clock.clone(),
    ));
    (service, store, orders, clock)
}

fn open_voucher(voucher_id: i64, stock: i64) -> SeckillVoucher {
    SeckillVoucher::new(
        VoucherId::new(voucher_id),
        stock,
        Utc.with_ymd_and_hms(2022, 6, 1, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2022, 6, 1, 14, 0, 0).unwrap(),
    )
}

async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn hundred_callers_ten_units_admits_exactly_ten() {
    let (service, store, _orders, _clock) = pipeline();
    service.publish_voucher(&open_voucher(10, 10)).await.unwrap();

    let mut handles = Vec::new();
    for user_id in 1..=100_i64 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::new(UserId::new(user_id));
            service.request_seckill(&ctx, VoucherId::new(10)).await
        }));
    }

    let mut admitted = Vec::new();
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(order_id) => admitted.push(order_id),
            Err(Error::OutOfStock) => out_of_stock += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    assert_eq!(admitted.len(), 10, "admissions must match listed stock");
    assert_eq!(out_of_stock, 90);
    assert_eq!(store.stock_of(VoucherId::new(10)), Some(0));
    assert_eq!(store.log_len(), 10, "one log record per admission");

    let mut unique = admitted.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), admitted.len(), "order ids must be unique");
}

#[tokio::test(flavor = "multi_thread")]
async fn one_user_twenty_parallel_attempts_wins_once() {
    let (service, store, _orders, _clock) = pipeline();
    service.publish_voucher(&open_voucher(10, 10)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::new(UserId::new(42));
            service.request_seckill(&ctx, VoucherId::new(10)).await
        }));
    }

    let mut admitted = 0;
    let mut duplicate = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(_) => admitted += 1,
            Err(Error::DuplicateOrder) => duplicate += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    assert_eq!(admitted, 1, "one order per user per voucher");
    assert_eq!(duplicate, 19);
    assert_eq!(store.stock_of(VoucherId::new(10)), Some(9));
    assert_eq!(store.buyers_of(VoucherId::new(10)), vec![UserId::new(42)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_commits_every_admitted_order_under_contention() {
    let (service, store, orders, clock) = pipeline();
    service.publish_voucher(&open_voucher(10, 10)).await.unwrap();

    let materializer = OrderMaterializer::new(
        Arc::new(orders.clone()),
        Arc::new(store.clone()),
        clock.clone(),
    );
    let (consumer, shutdown) = OrderConsumer::new(Arc::new(store.clone()), materializer);
    let consumer =
        consumer.with_config(ConsumerConfig::new().with_block_timeout(Duration::from_millis(20)));
    let pool = WorkerPool::new(WorkerPoolConfig::default());
    consumer.spawn_on(&pool);

    let mut handles = Vec::new();
    for user_id in 1..=100_i64 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::new(UserId::new(user_id));
            service.request_seckill(&ctx, VoucherId::new(10)).await
        }));
    }
    let mut admitted = 0;
    for handle in handles {
        if handle.await.expect("Task panicked").is_ok() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);

    wait_until(|| orders.orders_len() == 10 && store.pending_len() == 0).await;
    shutdown.send(true).expect("consumer listens for shutdown");
    pool.shutdown().await;

    assert_eq!(orders.orders_len(), 10, "every admission must be committed");
    assert_eq!(
        orders.remaining_stock(VoucherId::new(10)).await.unwrap(),
        Some(0),
        "relational stock must converge with the gate"
    );

    let rows = orders.all_orders();
    let mut users: Vec<UserId> = rows.iter().map(|row| row.user_id).collect();
    users.sort_unstable();
    users.dedup();
    assert_eq!(users.len(), 10, "one committed order per admitted user");
}
