//! Coordination-store key scheme.
//!
//! Every process that touches the coordination store must agree on these
//! names, so they live here rather than in any one backend crate.

use chrono::NaiveDate;

use crate::types::{UserId, VoucherId};

/// Durable log the admission script appends admitted orders to.
pub const ORDERS_STREAM: &str = "stream.orders";

/// Default consumer group reading [`ORDERS_STREAM`].
pub const DEFAULT_GROUP: &str = "g1";

/// Default consumer name within [`DEFAULT_GROUP`].
pub const DEFAULT_CONSUMER: &str = "c1";

/// Cached stock counter for a voucher.
#[must_use]
pub fn stock_key(voucher_id: VoucherId) -> String {
    format!("seckill:stock:{voucher_id}")
}

/// Set of users already admitted for a voucher.
#[must_use]
pub fn buyers_key(voucher_id: VoucherId) -> String {
    format!("seckill:order:{voucher_id}")
}

/// Per-user mutual-exclusion lock guarding order materialization.
#[must_use]
pub fn order_lock_key(user_id: UserId) -> String {
    format!("lock:order:{user_id}")
}

/// Daily sequence counter for the identifier generator.
///
/// The counter restarts each calendar day, bounding its growth and keeping
/// per-day issuance countable.
#[must_use]
pub fn daily_counter_key(business_key: &str, day: NaiveDate) -> String {
    format!("icr:{business_key}:{}", day.format("%Y:%m:%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats_are_stable() {
        assert_eq!(stock_key(VoucherId::new(10)), "seckill:stock:10");
        assert_eq!(buyers_key(VoucherId::new(10)), "seckill:order:10");
        assert_eq!(order_lock_key(UserId::new(5)), "lock:order:5");
        assert_eq!(ORDERS_STREAM, "stream.orders");
    }

    #[test]
    fn counter_key_buckets_by_day() {
        let day = NaiveDate::from_ymd_opt(2022, 1, 31).unwrap_or_default();
        assert_eq!(daily_counter_key("order", day), "icr:order:2022:01:31");
    }
}
