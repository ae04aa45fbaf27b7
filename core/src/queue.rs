//! Consumer-side view of the durable order log.
//!
//! Appending happens inside the admission script, atomically with the stock
//! decrement, so this trait only reads and acknowledges. Delivery follows
//! consumer-group semantics: each record goes to one consumer at a time and
//! stays on the group's pending list until acknowledged, which is what makes
//! crash recovery possible.
//!
//! Entries are surfaced as raw text field maps; parsing into an
//! [`OrderRecord`] happens in the consumer so that an unparseable entry can
//! still be acknowledged instead of wedging the pending list.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::types::OrderRecord;

/// Identifies one delivery of a log record, used for acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId(String);

impl DeliveryId {
    /// Wrap a backend-issued delivery identifier.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeliveryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One delivered log entry: the raw field map plus its acknowledgment handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEntry {
    /// Handle to acknowledge this delivery.
    pub delivery_id: DeliveryId,
    /// Field-value pairs as read off the log, values as text.
    pub fields: Vec<(String, String)>,
}

impl QueuedEntry {
    /// Parse the field map into an order record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::MalformedRecord`] when a required
    /// field is missing or not numeric.
    pub fn parse(&self) -> Result<OrderRecord> {
        OrderRecord::from_fields(self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Reads the durable order log under a consumer group.
///
/// Group and consumer names are fixed at construction time by the
/// implementation.
pub trait OrderQueue: Send + Sync {
    /// Read the next undelivered entry, waiting at most `block`.
    ///
    /// `Ok(None)` means the wait window elapsed without a new entry; callers
    /// loop. A returned entry joins the group's pending list until
    /// [`ack`](Self::ack)ed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] when the store is unreachable.
    fn read_new(&self, block: Duration) -> impl Future<Output = Result<Option<QueuedEntry>>> + Send;

    /// Read the oldest entry from this consumer's pending list, without
    /// blocking.
    ///
    /// `Ok(None)` means nothing is pending and recovery is complete.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] when the store is unreachable.
    fn read_pending(&self) -> impl Future<Output = Result<Option<QueuedEntry>>> + Send;

    /// Acknowledge a delivery, removing it from the pending list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on store failure; the entry
    /// then stays pending and is replayed during recovery.
    fn ack(&self, delivery_id: &DeliveryId) -> impl Future<Output = Result<()>> + Send;
}
