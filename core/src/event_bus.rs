//! Event bus abstraction for stream publish/subscribe.
//!
//! The [`EventBus`] trait is the seam between the read-model core and the
//! message broker. The command emitter publishes to the outbound purchase
//! topic; each ingestion consumer subscribes to exactly one inbound topic.
//!
//! # Key Principles
//!
//! - **At-least-once delivery**: events may be delivered more than once
//! - **Idempotency**: subscribers must tolerate duplicates
//! - **Ordered within partition**: events sharing a partition key keep their order
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (ticket-sync-testing) - for tests
//! - `RedpandaEventBus` (ticket-sync-redpanda) - for production (Kafka-compatible)

use crate::event::SerializedEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Failed to deserialize an envelope off the wire
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of events from a subscription.
///
/// Each item is a `Result`; transport-level errors are yielded in-band so the
/// subscriber can log them and keep reading.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
/// trait can be used as `Arc<dyn EventBus>` and shared between the emitter
/// and every consumer.
///
/// # Examples
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// event_bus.publish("ticketing-purchase-requests", &event).await?;
///
/// let mut stream = event_bus.subscribe(&["ticketing-inventory-updates"]).await?;
/// while let Some(result) = stream.next().await {
///     match result {
///         Ok(event) => apply(&event),
///         Err(e) => tracing::error!("Event stream error: {}", e),
///     }
/// }
/// ```
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the broker rejects the
    /// event or cannot be reached.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of events.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
