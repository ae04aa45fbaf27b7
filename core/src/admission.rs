//! Admission gate: the atomic check-and-admit operation.
//!
//! Admission runs as one indivisible operation against the coordination
//! store: stock check, per-user uniqueness check, optimistic stock
//! decrement and durable-log append either all happen or none do. No two
//! callers can both pass validation against the same unit of stock, which
//! makes this the sole oversell guard on the request path.

use std::future::Future;

use crate::error::{Error, Result};
use crate::types::{OrderId, UserId, VoucherId};

/// Outcome of one admission attempt.
///
/// The wire codes are the integers returned by the store-side script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// The order was admitted: stock decremented, user flagged, record
    /// appended to the durable log.
    Admitted,
    /// No stock counter exists for the voucher.
    VoucherNotFound,
    /// Stock counter is at or below zero.
    OutOfStock,
    /// The user already holds an order for this voucher.
    DuplicateOrder,
}

impl AdmissionOutcome {
    /// Wire code of this outcome.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Admitted => 0,
            Self::VoucherNotFound => 1,
            Self::OutOfStock => 2,
            Self::DuplicateOrder => 3,
        }
    }

    /// Decode a script return code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] for codes outside `0..=3`; an unknown code
    /// means the store-side script and this crate disagree.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::Admitted),
            1 => Ok(Self::VoucherNotFound),
            2 => Ok(Self::OutOfStock),
            3 => Ok(Self::DuplicateOrder),
            other => Err(Error::Store(format!("unexpected admission code {other}"))),
        }
    }

    /// `true` when the order was admitted.
    #[must_use]
    pub const fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted)
    }

    /// The rejection this outcome maps to, or `None` when admitted.
    #[must_use]
    pub const fn rejection(self) -> Option<Error> {
        match self {
            Self::Admitted => None,
            Self::VoucherNotFound => Some(Error::VoucherNotFound),
            Self::OutOfStock => Some(Error::OutOfStock),
            Self::DuplicateOrder => Some(Error::DuplicateOrder),
        }
    }

    /// Stable label for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::VoucherNotFound => "voucher_not_found",
            Self::OutOfStock => "out_of_stock",
            Self::DuplicateOrder => "duplicate_order",
        }
    }
}

/// The coordination-store face of a seckill sale.
///
/// `admit` is the per-request gate; `seed_stock` writes the cached counter
/// once at voucher setup time. Neither operation touches the relational
/// store.
pub trait AdmissionGate: Send + Sync {
    /// Run the atomic admission operation for one request.
    ///
    /// On [`AdmissionOutcome::Admitted`] the record
    /// `{order_id, user_id, voucher_id}` is already on the durable log when
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] when the coordination store is unreachable;
    /// the operation never partially applies.
    fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> impl Future<Output = Result<AdmissionOutcome>> + Send;

    /// Seed the cached stock counter for a voucher at setup time.
    ///
    /// Overwrites any previous counter for the voucher; callers publish a
    /// listing exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] when the coordination store is unreachable.
    fn seed_stock(
        &self,
        voucher_id: VoucherId,
        stock: i64,
    ) -> impl Future<Output = Result<()>> + Send;
}
