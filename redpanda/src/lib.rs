//! Redpanda event bus implementation for ticket-sync.
//!
//! This crate provides the production [`EventBus`] used by the command emitter
//! and the ingestion consumers. It uses rdkafka, so any Kafka-compatible
//! broker works (Redpanda, Apache Kafka, MSK, ...).
//!
//! # Topology
//!
//! ```text
//! ┌──────────────┐  purchase-requests   ┌──────────────────────┐
//! │   Command    │ ───────────────────► │  external payment /  │
//! │   Emitter    │                      │  inventory services  │
//! └──────────────┘                      └──────────┬───────────┘
//!                                                  │
//!                         inventory-updates        │  payment-status
//!                    ┌─────────────────────────────┴───────────┐
//!                    ▼                                         ▼
//!          ┌──────────────────┐                     ┌──────────────────┐
//!          │ inventory        │                     │ payment-status   │
//!          │ consumer         │                     │ consumer         │
//!          └──────────────────┘                     └──────────────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! The read models live in process memory, so every subscription replays its
//! topics from the configured reset point:
//! - Each `subscribe` joins a fresh consumer group that no other subscription
//!   or process shares, so every subscriber sees every partition
//! - Offsets are never committed; a restart or resubscribe with
//!   `auto_offset_reset("earliest")` rebuilds from the start of the topic
//! - Replays redeliver envelopes, so subscribers MUST be idempotent (the
//!   snapshot stores are, via last-writer-wins)
//! - Ordering is guaranteed within a partition; envelopes are partitioned by
//!   their key (purchase id or ticket type)
//!
//! # Example
//!
//! ```no_run
//! use ticket_sync_redpanda::RedpandaEventBus;
//! use ticket_sync_core::event_bus::EventBus;
//! use ticket_sync_core::event::SerializedEvent;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("ticket-sync-read-models")
//!     .auto_offset_reset("earliest")
//!     .build()?;
//!
//! let event = SerializedEvent::new("PurchaseRequested.v1".to_string(), vec![1, 2, 3], None)
//!     .with_key("p-1");
//! event_bus.publish("ticketing-purchase-requests", &event).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use ticket_sync_core::event::SerializedEvent;
use ticket_sync_core::event_bus::{EventBus, EventBusError, EventStream};

/// Default number of envelopes buffered between the Kafka consumer task and
/// the subscriber.
const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Subscriptions created by this process so far.
static SUBSCRIPTIONS: AtomicU64 = AtomicU64::new(0);

/// Redpanda event bus implementation.
///
/// Producer settings are fixed at build time; a fresh `StreamConsumer` in a
/// fresh consumer group is created per `subscribe` call, so each ingestion
/// consumer reads every partition of its topics.
pub struct RedpandaEventBus {
    /// Kafka producer for publishing events
    producer: FutureProducer,
    /// Broker addresses (for creating consumers)
    brokers: String,
    /// Producer timeout
    timeout: Duration,
    /// Consumer group ID (if explicitly set)
    consumer_group: Option<String>,
    /// Event buffer size for subscribers
    buffer_size: usize,
    /// Auto offset reset policy
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Create a new Redpanda event bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be
    /// created from the given broker list.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Consumer group used for one subscription to `topics`.
    ///
    /// The prefix and the sorted topic list keep the group recognizable in
    /// broker tooling. The process id, wall clock and a per-process counter
    /// make it unique, so no committed offsets or partition assignments are
    /// ever inherited from an earlier subscription, restart or replica.
    fn consumer_group_for(&self, topics: &[String]) -> String {
        let mut sorted_topics = topics.to_vec();
        sorted_topics.sort();
        let suffix = sorted_topics.join("-");
        let prefix = self.consumer_group.as_deref().unwrap_or("ticket-sync");
        let started = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos());
        let sequence = SUBSCRIPTIONS.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{suffix}-{}-{started}-{sequence}", std::process::id())
    }
}

/// Builder for configuring a [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Set the broker addresses (comma-separated, e.g. "localhost:9092").
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode: "0", "1" or "all".
    ///
    /// Default: "1"
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec: "none", "gzip", "snappy", "lz4", "zstd".
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the consumer group prefix for subscriptions.
    ///
    /// Each subscription still gets a group of its own; see
    /// [`RedpandaEventBus`].
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the event buffer size for subscriptions.
    ///
    /// A value of 0 is ignored and the default (1000) is used instead.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        if buffer_size > 0 {
            self.buffer_size = Some(buffer_size);
        }
        self
    }

    /// Set where every subscription starts reading:
    /// `"earliest"`, `"latest"` or `"error"`.
    ///
    /// Offsets are never committed, so this applies on every subscribe.
    /// Use `"earliest"` to rebuild state from the whole topic.
    ///
    /// Default: "latest"
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set or
    /// the producer cannot be created.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;

        let acks = self.producer_acks.as_deref().unwrap_or("1");
        let compression = self.compression.as_deref().unwrap_or("none");
        let buffer_size = self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let auto_offset_reset = self.auto_offset_reset.unwrap_or_else(|| "latest".to_string());

        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("compression.type", compression)
            .create()
            .map_err(|e| EventBusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            acks,
            compression,
            timeout_ms = timeout.as_millis(),
            buffer_size,
            auto_offset_reset = %auto_offset_reset,
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout,
            consumer_group: self.consumer_group,
            buffer_size,
            auto_offset_reset,
        })
    }
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let payload = bincode::serialize(&event).map_err(|e| EventBusError::PublishFailed {
                topic: topic.clone(),
                reason: format!("Failed to serialize event: {e}"),
            })?;

            let key = event.partition_key();
            let record = FutureRecord::to(&topic).payload(&payload).key(key);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        key,
                        event_type = %event.event_type,
                        "Event published"
                    );
                    Ok(())
                },
                Err((kafka_error, _)) => {
                    tracing::error!(topic = %topic, key, error = %kafka_error, "Failed to publish event");
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                },
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group_id = self.consumer_group_for(&topics);
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("enable.auto.offset.store", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                buffer_size,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to topics"
            );

            let (tx, mut rx) = tokio::sync::mpsc::channel(buffer_size);

            // The task owns the Kafka consumer and forwards envelopes.
            tokio::spawn(async move {
                use futures::StreamExt;

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    let message = match msg_result {
                        Ok(message) => message,
                        Err(e) => {
                            let err = EventBusError::TransportError(format!("Failed to receive message: {e}"));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                            continue;
                        },
                    };

                    let event_result = match message.payload() {
                        None => Err(EventBusError::DeserializationFailed(
                            "Message has no payload".to_string(),
                        )),
                        Some(payload) => bincode::deserialize::<SerializedEvent>(payload).map_err(|e| {
                            EventBusError::DeserializationFailed(format!("Failed to deserialize event: {e}"))
                        }),
                    };

                    if let Ok(event) = &event_result {
                        tracing::trace!(
                            topic = message.topic(),
                            partition = message.partition(),
                            offset = message.offset(),
                            event_type = %event.event_type,
                            "Received event"
                        );
                    }

                    if tx.send(event_result).await.is_err() {
                        tracing::debug!("Channel receiver dropped, exiting consumer task");
                        break;
                    }
                }

                tracing::debug!("Kafka consumer task exiting");
            });

            let stream = async_stream::stream! {
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = RedpandaEventBus::builder().build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    fn lazy_bus() -> RedpandaEventBus {
        // Creating a producer does not contact the broker.
        RedpandaEventBus::builder()
            .brokers("localhost:9092")
            .consumer_group("read-models")
            .build()
            .expect("producer should be created lazily")
    }

    #[test]
    fn consumer_groups_are_per_topic_set() {
        let bus = lazy_bus();

        let inventory = bus.consumer_group_for(&["inventory".to_string()]);
        let status = bus.consumer_group_for(&["status".to_string()]);

        assert!(inventory.starts_with("read-models-inventory-"), "{inventory}");
        assert!(status.starts_with("read-models-status-"), "{status}");
    }

    #[test]
    fn resubscribing_never_reuses_a_consumer_group() {
        let bus = lazy_bus();
        let topics = ["inventory".to_string()];

        let first = bus.consumer_group_for(&topics);
        let second = bus.consumer_group_for(&topics);

        assert_ne!(first, second);
        assert!(first.contains(&std::process::id().to_string()), "{first}");
    }

    #[test]
    fn zero_buffer_size_keeps_default() {
        let builder = RedpandaEventBus::builder().buffer_size(0);
        assert_eq!(builder.buffer_size, None);
    }
}
