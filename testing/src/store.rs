//! In-memory coordination store.
//!
//! One mutex-guarded state models everything the production pipeline keeps
//! in Redis: stock counters, buyer sets, the durable order log with its
//! consumer-group pending list, named locks and the daily sequence
//! counters. Holding the mutex across each operation reproduces the store's
//! defining property, that every operation is indivisible, so concurrency
//! tests exercise the same interleavings the real backend allows.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use seckill_core::id::{compose_id, epoch_seconds};
use seckill_core::keys::daily_counter_key;
use seckill_core::{
    AdmissionGate, AdmissionOutcome, Clock, DeliveryId, Error, IdGenerator, LockProvider,
    LockToken, OrderId, OrderQueue, OrderRecord, QueuedEntry, Result, SystemClock, UserId,
    VoucherId,
};

struct LogRecord {
    seq: u64,
    fields: Vec<(String, String)>,
}

struct HeldLock {
    owner: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    stock: HashMap<VoucherId, i64>,
    buyers: HashMap<VoucherId, HashSet<UserId>>,
    log: Vec<LogRecord>,
    cursor: usize,
    pending: BTreeMap<u64, Vec<(String, String)>>,
    next_seq: u64,
    counters: HashMap<String, i64>,
    locks: HashMap<String, HeldLock>,
    next_owner: u64,
    acked: u64,
    fail_next_reads: u32,
}

/// In-memory stand-in for the coordination store.
///
/// Implements every coordination trait at once, the way one Redis instance
/// backs all of them in production: [`AdmissionGate`], [`OrderQueue`],
/// [`LockProvider`] and [`IdGenerator`]. Clones share state.
///
/// # Example
///
/// ```
/// use seckill_core::{AdmissionGate, OrderId, UserId, VoucherId};
/// use seckill_testing::InMemoryCoordinationStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryCoordinationStore::new();
/// store.seed_stock(VoucherId::new(10), 1).await?;
///
/// let outcome = store
///     .admit(VoucherId::new(10), UserId::new(42), OrderId::new(1))
///     .await?;
/// assert!(outcome.is_admitted());
/// assert_eq!(store.stock_of(VoucherId::new(10)), Some(0));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryCoordinationStore {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCoordinationStore {
    /// Create an empty store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on an injected clock (drives identifier
    /// timestamps and daily counter keys).
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_seq: 1,
                ..Inner::default()
            })),
            notify: Arc::new(Notify::new()),
            clock,
        }
    }

    /// Remaining units on the cached stock counter, if seeded.
    #[must_use]
    pub fn stock_of(&self, voucher_id: VoucherId) -> Option<i64> {
        self.inner.lock().unwrap().stock.get(&voucher_id).copied()
    }

    /// Users admitted for a voucher, sorted for stable assertions.
    #[must_use]
    pub fn buyers_of(&self, voucher_id: VoucherId) -> Vec<UserId> {
        let inner = self.inner.lock().unwrap();
        let mut buyers: Vec<UserId> = inner
            .buyers
            .get(&voucher_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        buyers.sort_unstable();
        buyers
    }

    /// Number of records ever appended to the order log.
    #[must_use]
    pub fn log_len(&self) -> usize {
        self.inner.lock().unwrap().log.len()
    }

    /// Raw field map of the `index`-th log record.
    #[must_use]
    pub fn log_fields(&self, index: usize) -> Option<Vec<(String, String)>> {
        self.inner
            .lock()
            .unwrap()
            .log
            .get(index)
            .map(|record| record.fields.clone())
    }

    /// Number of delivered-but-unacknowledged records.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Number of deliveries acknowledged so far.
    #[must_use]
    pub fn acked_count(&self) -> u64 {
        self.inner.lock().unwrap().acked
    }

    /// Current value of a daily sequence counter.
    #[must_use]
    pub fn counter_value(&self, business_key: &str, day: chrono::NaiveDate) -> Option<i64> {
        self.inner
            .lock()
            .unwrap()
            .counters
            .get(&daily_counter_key(business_key, day))
            .copied()
    }

    /// Append an arbitrary field map to the log, bypassing admission.
    ///
    /// For injecting records the admission script would never produce.
    pub fn append_raw(&self, fields: Vec<(String, String)>) {
        {
            let mut inner = self.inner.lock().unwrap();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.log.push(LogRecord { seq, fields });
        }
        self.notify.notify_waiters();
    }

    /// Make the next `count` log reads fail with a store error.
    pub fn fail_next_reads(&self, count: u32) {
        self.inner.lock().unwrap().fail_next_reads = count;
    }

    fn take_read_failure(inner: &mut Inner) -> Result<()> {
        if inner.fail_next_reads > 0 {
            inner.fail_next_reads -= 1;
            return Err(Error::Store("injected read failure".to_owned()));
        }
        Ok(())
    }

    fn poll_new(&self) -> Result<Option<QueuedEntry>> {
        let mut inner = self.inner.lock().unwrap();
        Self::take_read_failure(&mut inner)?;

        if inner.cursor >= inner.log.len() {
            return Ok(None);
        }
        let record = &inner.log[inner.cursor];
        let entry = QueuedEntry {
            delivery_id: DeliveryId::new(format!("{}-0", record.seq)),
            fields: record.fields.clone(),
        };
        let seq = record.seq;
        let fields = record.fields.clone();
        inner.cursor += 1;
        inner.pending.insert(seq, fields);
        Ok(Some(entry))
    }

    fn poll_pending(&self) -> Result<Option<QueuedEntry>> {
        let mut inner = self.inner.lock().unwrap();
        Self::take_read_failure(&mut inner)?;

        Ok(inner.pending.iter().next().map(|(seq, fields)| QueuedEntry {
            delivery_id: DeliveryId::new(format!("{seq}-0")),
            fields: fields.clone(),
        }))
    }
}

impl Default for InMemoryCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionGate for InMemoryCoordinationStore {
    async fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<AdmissionOutcome> {
        {
            let mut inner = self.inner.lock().unwrap();

            match inner.stock.get(&voucher_id) {
                None => return Ok(AdmissionOutcome::VoucherNotFound),
                Some(stock) if *stock <= 0 => return Ok(AdmissionOutcome::OutOfStock),
                Some(_) => {},
            }
            if inner
                .buyers
                .get(&voucher_id)
                .is_some_and(|buyers| buyers.contains(&user_id))
            {
                return Ok(AdmissionOutcome::DuplicateOrder);
            }

            if let Some(stock) = inner.stock.get_mut(&voucher_id) {
                *stock -= 1;
            }
            inner.buyers.entry(voucher_id).or_default().insert(user_id);

            let record = OrderRecord::new(order_id, user_id, voucher_id);
            let fields = record
                .to_fields()
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.log.push(LogRecord { seq, fields });
        }
        self.notify.notify_waiters();
        Ok(AdmissionOutcome::Admitted)
    }

    async fn seed_stock(&self, voucher_id: VoucherId, stock: i64) -> Result<()> {
        self.inner.lock().unwrap().stock.insert(voucher_id, stock);
        Ok(())
    }
}

impl OrderQueue for InMemoryCoordinationStore {
    async fn read_new(&self, block: Duration) -> Result<Option<QueuedEntry>> {
        let deadline = Instant::now() + block;
        loop {
            // Register for wakeups before checking the log, so an append
            // landing between the check and the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(entry) = self.poll_new()? {
                return Ok(Some(entry));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn read_pending(&self) -> Result<Option<QueuedEntry>> {
        self.poll_pending()
    }

    async fn ack(&self, delivery_id: &DeliveryId) -> Result<()> {
        let seq = delivery_id
            .as_str()
            .split('-')
            .next()
            .and_then(|part| part.parse::<u64>().ok());
        if let Some(seq) = seq {
            let mut inner = self.inner.lock().unwrap();
            if inner.pending.remove(&seq).is_some() {
                inner.acked += 1;
            }
        }
        Ok(())
    }
}

impl LockProvider for InMemoryCoordinationStore {
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>> {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();

        if inner
            .locks
            .get(key)
            .is_some_and(|held| held.expires_at > now)
        {
            return Ok(None);
        }

        let owner = format!("mem-{}", inner.next_owner);
        inner.next_owner += 1;
        inner.locks.insert(
            key.to_owned(),
            HeldLock {
                owner: owner.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(Some(LockToken::new(key.to_owned(), owner)))
    }

    async fn unlock(&self, token: LockToken) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .locks
            .get(token.key())
            .is_some_and(|held| held.owner == token.owner())
        {
            inner.locks.remove(token.key());
        }
        Ok(())
    }
}

impl IdGenerator for InMemoryCoordinationStore {
    async fn next_id(&self, business_key: &str) -> Result<i64> {
        let now = self.clock.now();
        let key = daily_counter_key(business_key, now.date_naive());

        let mut inner = self.inner.lock().unwrap();
        let counter = inner.counters.entry(key).or_insert(0);
        *counter += 1;
        Ok(compose_id(epoch_seconds(now), *counter))
    }
}
