//! # Seckill Redis
//!
//! Redis-backed implementations of the `seckill-core` coordination traits.
//!
//! Everything the hot path needs from the coordination store lives here:
//!
//! - [`RedisAdmissionGate`]: the atomic admission script (stock check,
//!   duplicate check, decrement, buyer-set add and log append in one
//!   indivisible Lua evaluation).
//! - [`RedisIdGenerator`]: time-prefixed identifiers sequenced by a
//!   per-day `INCR` counter.
//! - [`RedisLockProvider`]: `SET NX EX` locks with owner-token-checked
//!   release.
//! - [`RedisOrderQueue`]: the durable order log as a stream read through a
//!   consumer group.
//!
//! Each type owns a [`redis::aio::ConnectionManager`], so clones share the
//! underlying multiplexed connection and reconnect automatically.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod admission;
pub mod id;
pub mod lock;
pub mod queue;

// Re-export main types for convenience
pub use admission::RedisAdmissionGate;
pub use id::RedisIdGenerator;
pub use lock::RedisLockProvider;
pub use queue::{QueueConfig, RedisOrderQueue};

use seckill_core::{Error, Result};

/// Open a managed connection to the given Redis URL.
///
/// Shared by every store in this crate; the manager multiplexes one
/// connection and transparently reconnects after failures.
async fn connect(redis_url: &str) -> Result<redis::aio::ConnectionManager> {
    let client = redis::Client::open(redis_url)
        .map_err(|e| Error::Store(format!("failed to create Redis client: {e}")))?;
    redis::aio::ConnectionManager::new(client)
        .await
        .map_err(|e| Error::Store(format!("failed to create Redis connection manager: {e}")))
}
