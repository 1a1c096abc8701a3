//! Command emitter: turns a purchase intent into a `PurchaseRequested`
//! envelope on the outbound stream.
//!
//! The emitter never touches the snapshot stores. A successful submit only
//! means the envelope was handed to the event bus; the status becomes
//! readable once the payment service reports back on its own stream.

use crate::events::{PurchaseRequested, TicketingEvent};
use crate::metrics;
use crate::types::{CustomerRef, PurchaseId, TicketType};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use ticket_sync_core::environment::Clock;
use ticket_sync_core::event::{EventError, EventMetadata};
use ticket_sync_core::event_bus::{EventBus, EventBusError};
use tracing::{info, warn};

/// Raw purchase intent as received from the request layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurchaseRequest {
    /// Caller-chosen purchase id
    pub purchase_id: String,
    /// Ticket category
    pub ticket_type: String,
    /// Number of tickets
    pub quantity: u32,
    /// Purchasing customer
    pub customer_ref: String,
}

/// Acknowledgement that a purchase was handed to the outbound stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionAck {
    /// Purchase that was published
    pub purchase_id: PurchaseId,
    /// Topic it was published to
    pub topic: String,
    /// When the emitter accepted it
    pub accepted_at: DateTime<Utc>,
}

/// Why a submit failed.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// Input rejected before anything was published
    #[error("invalid purchase request: {0}")]
    InvalidRequest(String),

    /// Envelope could not be encoded
    #[error("failed to encode purchase request: {0}")]
    Encode(#[from] EventError),

    /// Event bus did not accept the envelope
    #[error("failed to publish purchase request to {topic}: {source}")]
    PublishFailed {
        /// Outbound topic
        topic: String,
        /// Underlying bus error
        #[source]
        source: EventBusError,
    },
}

impl SubmitError {
    /// Whether the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PublishFailed { .. })
    }
}

/// Publishes purchase requests to the outbound stream.
#[derive(Clone)]
pub struct CommandEmitter {
    event_bus: Arc<dyn EventBus>,
    topic: String,
    clock: Arc<dyn Clock>,
}

impl CommandEmitter {
    /// Create an emitter publishing to `topic`.
    #[must_use]
    pub fn new(event_bus: Arc<dyn EventBus>, topic: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            event_bus,
            topic: topic.into(),
            clock,
        }
    }

    /// Outbound topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Validate `request` and publish it, keyed by purchase id.
    ///
    /// No retry happens here; a retryable failure is returned to the caller.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::InvalidRequest`] for an empty purchase id or ticket
    ///   type, or a zero quantity
    /// - [`SubmitError::PublishFailed`] if the event bus rejects the envelope
    pub async fn submit(&self, request: PurchaseRequest) -> Result<SubmissionAck, SubmitError> {
        let command = match validate(request) {
            Ok(command) => command,
            Err(e) => {
                metrics::record_purchase_submitted("invalid");
                return Err(e);
            },
        };

        let accepted_at = self.clock.now();
        let purchase_id = command.purchase_id.clone();
        let metadata = EventMetadata {
            correlation_id: Some(purchase_id.to_string()),
            causation_id: None,
            timestamp: Some(accepted_at.to_rfc3339()),
        };
        let envelope = TicketingEvent::from(command).to_serialized(Some(metadata))?;

        if let Err(source) = self.event_bus.publish(&self.topic, &envelope).await {
            warn!(purchase_id = %purchase_id, topic = %self.topic, error = %source, "Failed to publish purchase request");
            metrics::record_purchase_submitted("failed");
            return Err(SubmitError::PublishFailed {
                topic: self.topic.clone(),
                source,
            });
        }

        info!(purchase_id = %purchase_id, topic = %self.topic, "Purchase request published");
        metrics::record_purchase_submitted("accepted");
        Ok(SubmissionAck {
            purchase_id,
            topic: self.topic.clone(),
            accepted_at,
        })
    }
}

fn validate(request: PurchaseRequest) -> Result<PurchaseRequested, SubmitError> {
    if request.purchase_id.trim().is_empty() {
        return Err(SubmitError::InvalidRequest("purchase id must not be empty".to_string()));
    }
    if request.ticket_type.trim().is_empty() {
        return Err(SubmitError::InvalidRequest("ticket type must not be empty".to_string()));
    }
    if request.quantity == 0 {
        return Err(SubmitError::InvalidRequest("quantity must be positive".to_string()));
    }

    Ok(PurchaseRequested {
        purchase_id: PurchaseId::new(request.purchase_id),
        ticket_type: TicketType::new(request.ticket_type),
        quantity: request.quantity,
        customer_ref: CustomerRef::new(request.customer_ref),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ticket_sync_testing::{InMemoryEventBus, test_clock};

    const TOPIC: &str = "ticketing-purchase-requests";

    fn emitter(bus: &InMemoryEventBus) -> CommandEmitter {
        CommandEmitter::new(Arc::new(bus.clone()), TOPIC, Arc::new(test_clock()))
    }

    fn request(purchase_id: &str, quantity: u32) -> PurchaseRequest {
        PurchaseRequest {
            purchase_id: purchase_id.to_string(),
            ticket_type: "VIP".to_string(),
            quantity,
            customer_ref: "c-42".to_string(),
        }
    }

    #[tokio::test]
    async fn submit_publishes_keyed_envelope() {
        let bus = InMemoryEventBus::new();
        let ack = emitter(&bus).submit(request("p1", 2)).await.unwrap();

        assert_eq!(ack.purchase_id.as_str(), "p1");
        assert_eq!(ack.topic, TOPIC);
        assert_eq!(ack.accepted_at, test_clock().now());

        let published = bus.published(TOPIC);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key.as_deref(), Some("p1"));
        assert_eq!(published[0].event_type, "PurchaseRequested.v1");
        let metadata = published[0].metadata.clone().unwrap();
        assert_eq!(metadata.correlation_id.as_deref(), Some("p1"));

        let TicketingEvent::PurchaseRequested(command) = TicketingEvent::decode(&published[0]).unwrap() else {
            unreachable!("emitter only publishes purchase requests");
        };
        assert_eq!(command.quantity, 2);
        assert_eq!(command.customer_ref.as_str(), "c-42");
    }

    #[tokio::test]
    async fn invalid_requests_publish_nothing() {
        let bus = InMemoryEventBus::new();
        let emitter = emitter(&bus);

        let mut no_ticket = request("p1", 1);
        no_ticket.ticket_type = "  ".to_string();

        for bad in [request("", 1), request("p1", 0), no_ticket] {
            let err = emitter.submit(bad).await.unwrap_err();
            assert!(matches!(err, SubmitError::InvalidRequest(_)));
            assert!(!err.is_retryable());
        }
        assert!(bus.published(TOPIC).is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_retryable() {
        let bus = InMemoryEventBus::new();
        bus.set_available(false);

        let err = emitter(&bus).submit(request("p1", 1)).await.unwrap_err();
        assert!(matches!(err, SubmitError::PublishFailed { ref topic, .. } if topic == TOPIC));
        assert!(err.is_retryable());

        bus.set_available(true);
        emitter(&bus).submit(request("p1", 1)).await.unwrap();
        assert_eq!(bus.published(TOPIC).len(), 1);
    }
}
