//! Error types for the seckill pipeline.
//!
//! One taxonomy covers the whole pipeline: admission rejections are expected
//! business outcomes carried as error variants so callers can match on them;
//! infrastructure variants carry a description and are safe to retry. Lock
//! contention is *not* an error; `LockProvider::try_lock` returns `None`
//! for it.

use thiserror::Error;

/// Result type for seckill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the seckill pipeline.
#[derive(Debug, Error)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════
    // Admission rejections (expected outcomes, never retried)
    // ═══════════════════════════════════════════════════════════════
    /// No seckill stock counter exists for the requested voucher.
    #[error("voucher not found")]
    VoucherNotFound,

    /// The voucher's stock counter has reached zero.
    #[error("out of stock")]
    OutOfStock,

    /// The user already holds an order for this voucher.
    #[error("duplicate order")]
    DuplicateOrder,

    // ═══════════════════════════════════════════════════════════════
    // Infrastructure failures (retryable)
    // ═══════════════════════════════════════════════════════════════
    /// The coordination store is unreachable or returned a protocol error.
    ///
    /// Scripts execute atomically, so a failed admission never partially
    /// applies.
    #[error("coordination store error: {0}")]
    Store(String),

    /// The relational store is unreachable or a statement failed.
    #[error("relational store error: {0}")]
    Database(String),

    // ═══════════════════════════════════════════════════════════════
    // Data errors
    // ═══════════════════════════════════════════════════════════════
    /// A durable-log record could not be parsed into an order record.
    #[error("malformed order record: {0}")]
    MalformedRecord(String),

    /// A voucher listing failed setup validation (window or stock).
    #[error("invalid voucher: {0}")]
    InvalidVoucher(String),
}

impl Error {
    /// Returns `true` for admission rejections, the expected outcomes that
    /// the caller reports to the end user and never retries.
    ///
    /// # Examples
    ///
    /// ```
    /// use seckill_core::error::Error;
    ///
    /// assert!(Error::OutOfStock.is_rejection());
    /// assert!(!Error::Store("connection refused".into()).is_rejection());
    /// ```
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::VoucherNotFound | Self::OutOfStock | Self::DuplicateOrder
        )
    }

    /// Returns `true` for transient infrastructure failures where a retry
    /// may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// use seckill_core::error::Error;
    ///
    /// assert!(Error::Database("timeout".into()).is_retryable());
    /// assert!(!Error::DuplicateOrder.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_not_retryable() {
        for err in [Error::VoucherNotFound, Error::OutOfStock, Error::DuplicateOrder] {
            assert!(err.is_rejection());
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn infrastructure_errors_are_retryable() {
        for err in [
            Error::Store("down".into()),
            Error::Database("down".into()),
        ] {
            assert!(err.is_retryable());
            assert!(!err.is_rejection());
        }
    }

    #[test]
    fn data_errors_are_neither() {
        let err = Error::MalformedRecord("missing userId".into());
        assert!(!err.is_rejection());
        assert!(!err.is_retryable());

        let err = Error::InvalidVoucher("window already closed".into());
        assert!(!err.is_rejection());
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(Error::OutOfStock.to_string(), "out of stock");
        assert_eq!(
            Error::Store("refused".into()).to_string(),
            "coordination store error: refused"
        );
    }
}
