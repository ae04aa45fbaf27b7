//! Queue consumer: drives records from the durable log into the
//! materializer.
//!
//! The consumer is a two-state machine. It starts in `Recovering`, draining
//! its own delivered-but-unacknowledged entries (the aftermath of a crash
//! between receipt and acknowledgment), and switches to `Live` once the
//! pending list is empty. Any failure while live sends it back to
//! `Recovering`, because the failed entry is by then sitting on the pending
//! list. Acknowledgment always happens after materialization, giving
//! at-least-once delivery into an idempotent materializer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::clock::Clock;
use crate::error::Result;
use crate::lock::LockProvider;
use crate::materializer::OrderMaterializer;
use crate::orders::OrderStore;
use crate::queue::{OrderQueue, QueuedEntry};
use crate::worker::WorkerPool;

/// Consumer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Replaying this consumer's pending list from the start.
    Recovering,
    /// Reading new log entries under the consumer group.
    Live,
}

impl ConsumerState {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recovering => "recovering",
            Self::Live => "live",
        }
    }
}

/// Tuning for the consumer loop.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Upper bound on one blocking read while live.
    ///
    /// Default: 2 seconds. Shutdown is noticed at most one timeout after it
    /// is signalled.
    pub block_timeout: Duration,

    /// Pause after a failed read or materialization before retrying.
    ///
    /// Default: 20 milliseconds.
    pub error_backoff: Duration,
}

impl ConsumerConfig {
    /// Create the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            block_timeout: Duration::from_secs(2),
            error_backoff: Duration::from_millis(20),
        }
    }

    /// Set the blocking-read bound.
    #[must_use]
    pub const fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }

    /// Set the error backoff.
    #[must_use]
    pub const fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Long-running worker that materializes admitted orders.
///
/// One consumer runs per process instance; multiple instances share the
/// consumer group, and the store guarantees each entry is delivered to only
/// one of them at a time.
pub struct OrderConsumer<Q, S, L, C> {
    queue: Arc<Q>,
    materializer: OrderMaterializer<S, L, C>,
    config: ConsumerConfig,
    shutdown: watch::Receiver<bool>,
}

impl<Q, S, L, C> OrderConsumer<Q, S, L, C>
where
    Q: OrderQueue + 'static,
    S: OrderStore + 'static,
    L: LockProvider + 'static,
    C: Clock + 'static,
{
    /// Create a consumer and the sender used to stop it.
    ///
    /// Send `true` on the returned channel to request shutdown; `run`
    /// returns after the in-flight step completes.
    #[must_use]
    pub fn new(
        queue: Arc<Q>,
        materializer: OrderMaterializer<S, L, C>,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumer = Self {
            queue,
            materializer,
            config: ConsumerConfig::default(),
            shutdown: shutdown_rx,
        };
        (consumer, shutdown_tx)
    }

    /// Override the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ConsumerConfig) -> Self {
        self.config = config;
        self
    }

    /// Submit this consumer's loop to a worker pool.
    pub fn spawn_on(self, pool: &WorkerPool) {
        pool.submit(self.run());
    }

    /// Run the consumer until shutdown is requested.
    ///
    /// Never returns early on store failures; those are logged, backed off,
    /// and retried through the recovery path.
    pub async fn run(mut self) {
        tracing::info!("order consumer started");
        let mut state = ConsumerState::Recovering;

        while !*self.shutdown.borrow() {
            state = match state {
                ConsumerState::Recovering => self.recovering_step().await,
                ConsumerState::Live => self.live_step().await,
            };
        }

        tracing::info!("order consumer stopped");
    }

    /// One recovery iteration: handle the oldest pending entry, or switch to
    /// live consumption when the pending list is empty.
    async fn recovering_step(&mut self) -> ConsumerState {
        match self.queue.read_pending().await {
            Ok(None) => {
                tracing::info!("pending list drained, switching to live consumption");
                ConsumerState::Live
            },
            Ok(Some(entry)) => {
                if let Err(err) = self.handle(entry).await {
                    tracing::warn!(error = %err, "failed to replay pending entry, retrying");
                    self.backoff().await;
                }
                ConsumerState::Recovering
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to read pending list, retrying");
                self.backoff().await;
                ConsumerState::Recovering
            },
        }
    }

    /// One live iteration: a bounded blocking read, interruptible by
    /// shutdown.
    async fn live_step(&mut self) -> ConsumerState {
        let read_result = tokio::select! {
            _ = self.shutdown.changed() => return ConsumerState::Live,
            result = self.queue.read_new(self.config.block_timeout) => result,
        };

        match read_result {
            Ok(None) => ConsumerState::Live,
            Ok(Some(entry)) => {
                if let Err(err) = self.handle(entry).await {
                    tracing::warn!(error = %err, "live handling failed, entering recovery");
                    ConsumerState::Recovering
                } else {
                    ConsumerState::Live
                }
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to read order log, entering recovery");
                self.backoff().await;
                ConsumerState::Recovering
            },
        }
    }

    /// Materialize and acknowledge one delivered entry.
    ///
    /// Unparseable entries are acknowledged after an error log: replaying
    /// them forever would wedge the pending list, and admission never
    /// produces them.
    async fn handle(&self, entry: QueuedEntry) -> Result<()> {
        match entry.parse() {
            Ok(record) => {
                self.materializer.materialize(&record).await?;
                self.queue.ack(&entry.delivery_id).await?;
                metrics::counter!("seckill_queue_acked_total").increment(1);
                Ok(())
            },
            Err(err) => {
                metrics::counter!("seckill_queue_poison_total").increment(1);
                tracing::error!(
                    delivery_id = %entry.delivery_id,
                    error = %err,
                    "unparseable order record, acknowledging and skipping"
                );
                self.queue.ack(&entry.delivery_id).await
            },
        }
    }

    async fn backoff(&self) {
        tokio::time::sleep(self.config.error_backoff).await;
    }
}
