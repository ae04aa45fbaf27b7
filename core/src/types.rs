//! Domain identifiers and records for the seckill pipeline.
//!
//! Identifiers are `i64` newtypes: that is the shape they have in the
//! relational store and on the durable log (where they travel as decimal
//! text). [`OrderRecord`] owns the wire shape of a queued order, a flat
//! field-value map with string values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifies a seckill voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoucherId(i64);

/// Identifies a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(i64);

/// Identifies an order. Produced by the identifier generator; time-ordered
/// per business key (see [`crate::id`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(i64);

macro_rules! impl_i64_id {
    ($name:ident) => {
        impl $name {
            /// Create an identifier from its raw value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// The raw identifier value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<i64>().map(Self)
            }
        }
    };
}

impl_i64_id!(VoucherId);
impl_i64_id!(UserId);
impl_i64_id!(OrderId);

/// Wire field name for the order identifier on the durable log.
pub const FIELD_ORDER_ID: &str = "orderId";
/// Wire field name for the user identifier on the durable log.
pub const FIELD_USER_ID: &str = "userId";
/// Wire field name for the voucher identifier on the durable log.
pub const FIELD_VOUCHER_ID: &str = "voucherId";

/// An admitted order as appended to the durable log by the admission script
/// and consumed by the queue consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Pre-generated order identifier, already returned to the caller.
    pub order_id: OrderId,
    /// The admitted user.
    pub user_id: UserId,
    /// The voucher being purchased.
    pub voucher_id: VoucherId,
}

impl OrderRecord {
    /// Create a record for an admitted order.
    #[must_use]
    pub const fn new(order_id: OrderId, user_id: UserId, voucher_id: VoucherId) -> Self {
        Self {
            order_id,
            user_id,
            voucher_id,
        }
    }

    /// The flat field-value map appended to the durable log. All values are
    /// decimal text.
    ///
    /// # Examples
    ///
    /// ```
    /// use seckill_core::types::{OrderId, OrderRecord, UserId, VoucherId};
    ///
    /// let record = OrderRecord::new(OrderId::new(7), UserId::new(1), VoucherId::new(10));
    /// let fields = record.to_fields();
    /// assert_eq!(fields[0], ("orderId", "7".to_string()));
    /// ```
    #[must_use]
    pub fn to_fields(&self) -> [(&'static str, String); 3] {
        [
            (FIELD_ORDER_ID, self.order_id.to_string()),
            (FIELD_USER_ID, self.user_id.to_string()),
            (FIELD_VOUCHER_ID, self.voucher_id.to_string()),
        ]
    }

    /// Parse a record from a field-value map read off the durable log.
    ///
    /// Unknown fields are ignored; order does not matter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRecord`] when a required field is missing
    /// or not a decimal integer.
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut order_id = None;
        let mut user_id = None;
        let mut voucher_id = None;

        for (name, value) in fields {
            match name.as_ref() {
                FIELD_ORDER_ID => order_id = Some(parse_field::<OrderId>(FIELD_ORDER_ID, value.as_ref())?),
                FIELD_USER_ID => user_id = Some(parse_field::<UserId>(FIELD_USER_ID, value.as_ref())?),
                FIELD_VOUCHER_ID => {
                    voucher_id = Some(parse_field::<VoucherId>(FIELD_VOUCHER_ID, value.as_ref())?);
                },
                _ => {},
            }
        }

        match (order_id, user_id, voucher_id) {
            (Some(order_id), Some(user_id), Some(voucher_id)) => {
                Ok(Self::new(order_id, user_id, voucher_id))
            },
            (None, _, _) => Err(missing_field(FIELD_ORDER_ID)),
            (_, None, _) => Err(missing_field(FIELD_USER_ID)),
            (_, _, None) => Err(missing_field(FIELD_VOUCHER_ID)),
        }
    }

    /// The committed order this record materializes into.
    #[must_use]
    pub const fn to_order(&self, created_at: DateTime<Utc>) -> VoucherOrder {
        VoucherOrder {
            id: self.order_id,
            user_id: self.user_id,
            voucher_id: self.voucher_id,
            created_at,
        }
    }
}

fn parse_field<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| Error::MalformedRecord(format!("field {name} is not an integer: {value:?}")))
}

fn missing_field(name: &str) -> Error {
    Error::MalformedRecord(format!("missing field {name}"))
}

/// A committed order row. Created exactly once by the materializer and never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherOrder {
    /// Order identifier (same value the caller received at admission time).
    pub id: OrderId,
    /// The purchasing user.
    pub user_id: UserId,
    /// The purchased voucher.
    pub voucher_id: VoucherId,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

impl VoucherOrder {
    /// Create a committed order row.
    #[must_use]
    pub const fn new(
        id: OrderId,
        user_id: UserId,
        voucher_id: VoucherId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            voucher_id,
            created_at,
        }
    }
}

/// A time-boxed seckill listing, configured once before the sale opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeckillVoucher {
    /// The voucher being listed.
    pub voucher_id: VoucherId,
    /// Units available for the whole sale window.
    pub stock: i64,
    /// When the sale opens.
    pub begin_time: DateTime<Utc>,
    /// When the sale closes.
    pub end_time: DateTime<Utc>,
}

impl SeckillVoucher {
    /// Create a listing.
    #[must_use]
    pub const fn new(
        voucher_id: VoucherId,
        stock: i64,
        begin_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            voucher_id,
            stock,
            begin_time,
            end_time,
        }
    }
}

/// Request-scoped context carrying the authenticated caller identity.
///
/// Passed explicitly through the call chain; nothing in this crate reads
/// ambient global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// The authenticated user making the request.
    pub user_id: UserId,
}

impl RequestContext {
    /// Context for an authenticated user.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code asserts on parse results

    use super::*;

    #[test]
    fn id_display_and_parse_round_trip() {
        let id = OrderId::new(76_561_198_000_000_001);
        assert_eq!(id.to_string(), "76561198000000001");
        assert_eq!("76561198000000001".parse::<OrderId>().unwrap(), id);
    }

    #[test]
    fn record_fields_use_wire_names() {
        let record = OrderRecord::new(OrderId::new(42), UserId::new(7), VoucherId::new(3));
        let fields = record.to_fields();
        assert_eq!(fields[0].0, "orderId");
        assert_eq!(fields[1].0, "userId");
        assert_eq!(fields[2].0, "voucherId");
        assert_eq!(fields[2].1, "3");
    }

    #[test]
    fn record_parses_in_any_field_order() {
        let record = OrderRecord::from_fields([
            ("voucherId", "3"),
            ("orderId", "42"),
            ("userId", "7"),
            ("ignored", "x"),
        ])
        .unwrap();
        assert_eq!(record.order_id, OrderId::new(42));
        assert_eq!(record.user_id, UserId::new(7));
        assert_eq!(record.voucher_id, VoucherId::new(3));
    }

    #[test]
    fn record_rejects_missing_field() {
        let err = OrderRecord::from_fields([("orderId", "42"), ("userId", "7")]).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
        assert!(err.to_string().contains("voucherId"));
    }

    #[test]
    fn record_rejects_non_numeric_field() {
        let err = OrderRecord::from_fields([
            ("orderId", "42"),
            ("userId", "not-a-number"),
            ("voucherId", "3"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn record_to_order_keeps_identifiers() {
        let record = OrderRecord::new(OrderId::new(42), UserId::new(7), VoucherId::new(3));
        let now = Utc::now();
        let order = record.to_order(now);
        assert_eq!(order.id, record.order_id);
        assert_eq!(order.user_id, record.user_id);
        assert_eq!(order.voucher_id, record.voucher_id);
        assert_eq!(order.created_at, now);
    }
}
