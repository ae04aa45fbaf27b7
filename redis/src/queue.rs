//! The durable order log as a Redis stream.
//!
//! The admission script appends entries; this type only reads and
//! acknowledges them through a consumer group. Reading with `>` delivers
//! new entries and simultaneously parks them on this consumer's pending
//! list; reading with `0` replays that pending list, which is how a
//! restarted consumer finds whatever it had received but never
//! acknowledged.

use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};

use seckill_core::keys::{DEFAULT_CONSUMER, DEFAULT_GROUP, ORDERS_STREAM};
use seckill_core::{DeliveryId, Error, OrderQueue, QueuedEntry, Result};

/// Names binding a queue instance to its stream, group and consumer.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Stream key holding the order log.
    pub stream: String,
    /// Consumer group; every group sees the full log once.
    pub group: String,
    /// Consumer name within the group; owns its own pending list.
    pub consumer: String,
}

impl QueueConfig {
    /// The default stream, group and consumer names.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stream: ORDERS_STREAM.to_owned(),
            group: DEFAULT_GROUP.to_owned(),
            consumer: DEFAULT_CONSUMER.to_owned(),
        }
    }

    /// Set the stream key.
    #[must_use]
    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }

    /// Set the consumer group.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Set the consumer name.
    #[must_use]
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Redis-stream-backed [`OrderQueue`].
#[derive(Clone)]
pub struct RedisOrderQueue {
    conn_manager: ConnectionManager,
    config: QueueConfig,
}

impl RedisOrderQueue {
    /// Create a queue on the default stream, group and consumer names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the connection or the consumer group
    /// cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::with_config(redis_url, QueueConfig::new()).await
    }

    /// Create a queue with explicit names.
    ///
    /// The consumer group is created if it does not exist yet, together
    /// with the stream itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the connection or the consumer group
    /// cannot be established.
    pub async fn with_config(redis_url: &str, config: QueueConfig) -> Result<Self> {
        let conn_manager = crate::connect(redis_url).await?;
        let queue = Self {
            conn_manager,
            config,
        };
        queue.ensure_group().await?;
        Ok(queue)
    }

    async fn ensure_group(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.config.stream, &self.config.group, "0")
            .await;

        match created {
            Ok(()) => {
                tracing::info!(
                    stream = %self.config.stream,
                    group = %self.config.group,
                    "consumer group created"
                );
                Ok(())
            },
            Err(err) if err.code() == Some("BUSYGROUP") => Ok(()),
            Err(err) => Err(Error::Store(format!(
                "failed to create consumer group: {err}"
            ))),
        }
    }

    async fn read_one(&self, id: &str, options: StreamReadOptions) -> Result<Option<QueuedEntry>> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[self.config.stream.as_str()], &[id], &options)
            .await
            .map_err(|e| Error::Store(format!("failed to read order log: {e}")))?;

        Ok(reply.and_then(first_entry))
    }
}

impl OrderQueue for RedisOrderQueue {
    async fn read_new(&self, block: Duration) -> Result<Option<QueuedEntry>> {
        let block_ms = usize::try_from(block.as_millis()).unwrap_or(usize::MAX);
        let options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(1)
            .block(block_ms);
        self.read_one(">", options).await
    }

    async fn read_pending(&self) -> Result<Option<QueuedEntry>> {
        let options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(1);
        self.read_one("0", options).await
    }

    async fn ack(&self, delivery_id: &DeliveryId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: i64 = conn
            .xack(
                &self.config.stream,
                &self.config.group,
                &[delivery_id.as_str()],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to acknowledge {delivery_id}: {e}")))?;
        Ok(())
    }
}

/// Flatten the nested read reply into its first entry, if any.
fn first_entry(reply: StreamReadReply) -> Option<QueuedEntry> {
    let key = reply.keys.into_iter().next()?;
    let entry = key.ids.into_iter().next()?;

    let fields = entry
        .map
        .into_iter()
        .map(|(name, value)| {
            let text = redis::from_redis_value::<String>(&value).unwrap_or_default();
            (name, text)
        })
        .collect();

    Some(QueuedEntry {
        delivery_id: DeliveryId::new(entry.id),
        fields,
    })
}
