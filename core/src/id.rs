//! Distributed identifier generation.
//!
//! Identifiers are 64-bit signed integers laid out as:
//!
//! ```text
//! | 1 sign bit (0) | 31-bit seconds since 2022-01-01T00:00:00Z | 32-bit sequence |
//! ```
//!
//! The sequence comes from atomically incrementing a per-day counter in the
//! coordination store (see [`crate::keys::daily_counter_key`]), so two calls
//! in the same second never collide, and calls in different seconds are
//! ordered by the timestamp bits. The layout helpers live here so every
//! generator implementation assembles identifiers identically.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Generator epoch: 2022-01-01T00:00:00Z.
pub const ID_EPOCH_SECONDS: i64 = 1_640_995_200;

/// Width of the sequence field.
pub const SEQUENCE_BITS: u32 = 32;

/// Business key under which order identifiers are issued.
pub const ORDER_BUSINESS_KEY: &str = "order";

/// Assemble an identifier from its timestamp and sequence parts.
///
/// `seconds_since_epoch` is seconds elapsed since [`ID_EPOCH_SECONDS`].
#[must_use]
pub const fn compose_id(seconds_since_epoch: i64, sequence: i64) -> i64 {
    (seconds_since_epoch << SEQUENCE_BITS) | sequence
}

/// Seconds elapsed between the generator epoch and `now`.
#[must_use]
pub fn epoch_seconds(now: DateTime<Utc>) -> i64 {
    now.timestamp() - ID_EPOCH_SECONDS
}

/// The sequence field of an identifier.
#[must_use]
pub const fn sequence_of(id: i64) -> i64 {
    id & 0xFFFF_FFFF
}

/// The wall-clock second an identifier was issued in.
#[must_use]
pub fn timestamp_of(id: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp((id >> SEQUENCE_BITS) + ID_EPOCH_SECONDS, 0)
}

/// Produces globally unique, time-ordered identifiers per business key.
pub trait IdGenerator: Send + Sync {
    /// Next identifier for `business_key`.
    ///
    /// Monotonically increasing in time order across all callers for a fixed
    /// key; concurrent calls never return equal values.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] when the coordination store is
    /// unreachable, the only failure mode; callers may retry.
    fn next_id(&self, business_key: &str) -> impl Future<Output = Result<i64>> + Send;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code asserts on timestamps

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn epoch_is_2022_01_01() {
        let epoch = DateTime::from_timestamp(ID_EPOCH_SECONDS, 0).unwrap();
        assert_eq!(epoch.to_rfc3339(), "2022-01-01T00:00:00+00:00");
        assert_eq!(epoch_seconds(epoch), 0);
    }

    #[test]
    fn known_layout_example() {
        // One second after the epoch, first sequence value of the day.
        assert_eq!(compose_id(1, 1), (1_i64 << 32) | 1);
        assert_eq!(compose_id(1, 1), 4_294_967_297);
    }

    #[test]
    fn timestamp_recovers_issue_second() {
        let now = DateTime::from_timestamp(ID_EPOCH_SECONDS + 86_400, 0).unwrap();
        let id = compose_id(epoch_seconds(now), 17);
        assert_eq!(timestamp_of(id).unwrap(), now);
        assert_eq!(sequence_of(id), 17);
    }

    proptest! {
        #[test]
        fn layout_round_trips(
            secs in 0_i64..(1_i64 << 31),
            seq in 0_i64..=i64::from(u32::MAX),
        ) {
            let id = compose_id(secs, seq);
            prop_assert!(id >= 0);
            prop_assert_eq!(id >> SEQUENCE_BITS, secs);
            prop_assert_eq!(sequence_of(id), seq);
        }

        #[test]
        fn later_seconds_dominate_ordering(
            early in 0_i64..(1_i64 << 30),
            gap in 1_i64..(1_i64 << 20),
            seq_a in 0_i64..=i64::from(u32::MAX),
            seq_b in 0_i64..=i64::from(u32::MAX),
        ) {
            let a = compose_id(early, seq_a);
            let b = compose_id(early + gap, seq_b);
            prop_assert!(a < b);
        }
    }
}
