//! # Seckill Core
//!
//! Domain model and coordination logic for a flash-sale ("seckill")
//! admission pipeline.
//!
//! ## Architecture
//!
//! Purchase requests are decided by a single atomic script against a shared
//! coordination store; admitted orders are appended to a durable log and
//! materialized into the relational store by a background consumer:
//!
//! ```text
//! Request → IdGenerator → AdmissionGate ──→ durable log
//!                                               │
//!                        OrderConsumer ←────────┘
//!                              │
//!                        OrderMaterializer → OrderStore (relational)
//! ```
//!
//! This crate defines the traits at each seam ([`AdmissionGate`],
//! [`IdGenerator`], [`LockProvider`], [`OrderQueue`], [`OrderStore`],
//! [`VoucherStore`], [`Clock`]) and the generic machinery over them; it
//! performs no I/O of its own. Production implementations live in
//! `seckill-redis` and `seckill-postgres`, in-memory ones in
//! `seckill-testing`.
//!
//! ## Guarantees
//!
//! - Stock never oversells: admissions are bounded by the seeded counter.
//! - At most one admission, and at most one committed row, per
//!   `(user, voucher)` pair.
//! - The durable log is drained at-least-once into an idempotent
//!   materializer, so a crash between delivery and acknowledgment loses
//!   nothing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use seckill_core::*;
//!
//! let service = SeckillService::new(gate, ids, vouchers, clock);
//! let ctx = RequestContext::new(UserId::new(42));
//!
//! match service.request_seckill(&ctx, VoucherId::new(10)).await {
//!     Ok(order_id) => println!("admitted, order {order_id}"),
//!     Err(Error::OutOfStock) => println!("sold out"),
//!     Err(err) => println!("try again later: {err}"),
//! }
//! ```

// Public modules
pub mod admission;
pub mod clock;
pub mod consumer;
pub mod error;
pub mod id;
pub mod keys;
pub mod lock;
pub mod materializer;
pub mod orders;
pub mod queue;
pub mod service;
pub mod types;
pub mod worker;

// Re-export main types for convenience
pub use admission::{AdmissionGate, AdmissionOutcome};
pub use clock::{Clock, SystemClock};
pub use consumer::{ConsumerConfig, ConsumerState, OrderConsumer};
pub use error::{Error, Result};
pub use id::{IdGenerator, ORDER_BUSINESS_KEY};
pub use lock::{LockProvider, LockToken, try_lock_all, unlock_all};
pub use materializer::{MaterializerConfig, OrderMaterializer};
pub use orders::{OrderCreation, OrderStore, VoucherStore};
pub use queue::{DeliveryId, OrderQueue, QueuedEntry};
pub use service::SeckillService;
pub use types::{
    OrderId, OrderRecord, RequestContext, SeckillVoucher, UserId, VoucherId, VoucherOrder,
};
pub use worker::{WorkerPool, WorkerPoolConfig};
