//! End-to-end admission scenarios through the service entry point.
//!
//! Drives `SeckillService` over the in-memory coordination store and
//! relational store, including the full admit-queue-materialize pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code asserts on exact outcomes

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use seckill_core::{
    Clock, ConsumerConfig, Error, OrderConsumer, OrderMaterializer, RequestContext, SeckillService,
    SeckillVoucher, UserId, VoucherId, VoucherStore, WorkerPool, WorkerPoolConfig,
};
use seckill_testing::{FixedClock, InMemoryCoordinationStore, InMemoryOrderStore};

type Service =
    SeckillService<InMemoryCoordinationStore, InMemoryCoordinationStore, InMemoryOrderStore, FixedClock>;

struct Pipeline {
    service: Service,
    store: InMemoryCoordinationStore,
    orders: InMemoryOrderStore,
    clock: Arc<FixedClock>,
}

fn pipeline() -> Pipeline {
    let clock = Arc::new(FixedClock::default());
    let store = InMemoryCoordinationStore::with_clock(clock.clone());
    let orders = InMemoryOrderStore::new();
    let service = SeckillService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(orders.clone()),
        clock.clone(),
    );
    Pipeline {
        service,
        store,
        orders,
        clock,
    }
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

#[tokio::test]
async fn unknown_voucher_is_rejected() {
    let p = pipeline();
    let ctx = RequestContext::new(UserId::new(42));

    let result = p.service.request_seckill(&ctx, VoucherId::new(999)).await;

    assert!(matches!(result, Err(Error::VoucherNotFound)));
    assert_eq!(p.store.log_len(), 0, "rejection must not reach the log");
}

#[tokio::test]
async fn publish_seeds_counter_to_listed_stock() {
    let p = pipeline();

    p.service.publish_voucher(&open_voucher(10, 25)).await.unwrap();

    assert_eq!(p.store.stock_of(VoucherId::new(10)), Some(25));
    assert_eq!(
        p.orders.remaining_stock(VoucherId::new(10)).await.unwrap(),
        Some(25)
    );
}

#[tokio::test]
async fn stock_one_race_admits_exactly_one() {
    let p = pipeline();
    p.service.publish_voucher(&open_voucher(10, 1)).await.unwrap();

    let service = Arc::new(p.service);
    let mut handles = Vec::new();
    for user_id in [1_i64, 2] {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::new(UserId::new(user_id));
            service.request_seckill(&ctx, VoucherId::new(10)).await
        }));
    }

    let mut admitted = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(_) => admitted += 1,
            Err(Error::OutOfStock) => out_of_stock += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    assert_eq!(admitted, 1, "exactly one caller may win the last unit");
    assert_eq!(out_of_stock, 1);
    assert_eq!(p.store.stock_of(VoucherId::new(10)), Some(0));
    assert_eq!(p.store.log_len(), 1);
}

#[tokio::test]
async fn sequential_duplicate_is_rejected_after_one_decrement() {
    let p = pipeline();
    p.service.publish_voucher(&open_voucher(10, 10)).await.unwrap();
    let ctx = RequestContext::new(UserId::new(42));

    let first = p.service.request_seckill(&ctx, VoucherId::new(10)).await;
    assert!(first.is_ok());

    let second = p.service.request_seckill(&ctx, VoucherId::new(10)).await;
    assert!(matches!(second, Err(Error::DuplicateOrder)));

    assert_eq!(
        p.store.stock_of(VoucherId::new(10)),
        Some(9),
        "duplicate must not decrement again"
    );
    assert_eq!(p.store.log_len(), 1);
    assert_eq!(p.store.buyers_of(VoucherId::new(10)), vec![UserId::new(42)]);
}

#[tokio::test]
async fn admission_appends_the_wire_format_record() {
    let p = pipeline();
    p.service.publish_voucher(&open_voucher(10, 5)).await.unwrap();
    let ctx = RequestContext::new(UserId::new(42));

    let order_id = p
        .service
        .request_seckill(&ctx, VoucherId::new(10))
        .await
        .unwrap();

    let fields = p.store.log_fields(0).expect("one record appended");
    assert_eq!(
        fields,
        vec![
            ("orderId".to_owned(), order_id.to_string()),
            ("userId".to_owned(), "42".to_owned()),
            ("voucherId".to_owned(), "10".to_owned()),
        ]
    );
}

#[tokio::test]
async fn full_pipeline_commits_the_admitted_order() {
    let p = pipeline();
    p.service.publish_voucher(&open_voucher(10, 5)).await.unwrap();
    let ctx = RequestContext::new(UserId::new(42));
    let order_id = p
        .service
        .request_seckill(&ctx, VoucherId::new(10))
        .await
        .unwrap();

    let materializer = OrderMaterializer::new(
        Arc::new(p.orders.clone()),
        Arc::new(p.store.clone()),
        p.clock.clone(),
    );
    let (consumer, shutdown) = OrderConsumer::new(Arc::new(p.store.clone()), materializer);
    let consumer =
        consumer.with_config(ConsumerConfig::new().with_block_timeout(Duration::from_millis(20)));

    let pool = WorkerPool::new(WorkerPoolConfig::default());
    consumer.spawn_on(&pool);

    wait_until(|| p.orders.orders_len() == 1).await;
    shutdown.send(true).expect("consumer listens for shutdown");
    pool.shutdown().await;

    let rows = p.orders.all_orders();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, order_id);
    assert_eq!(rows[0].user_id, UserId::new(42));
    assert_eq!(rows[0].voucher_id, VoucherId::new(10));
    assert_eq!(rows[0].created_at, p.clock.now());

    assert_eq!(p.store.pending_len(), 0, "committed order must be acknowledged");
    assert_eq!(
        p.orders.remaining_stock(VoucherId::new(10)).await.unwrap(),
        Some(4)
    );
}
