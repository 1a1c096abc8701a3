//! Event envelopes exchanged over the three ticketing streams.
//!
//! ```text
//! outbound  ticketing-purchase-requests   PurchaseRequested     key: purchase id
//! inbound   ticketing-inventory-updates   InventoryUpdated      key: ticket type
//! inbound   ticketing-payment-status      PaymentStatusUpdated  key: purchase id
//! ```
//!
//! All three travel as a bincode-encoded [`TicketingEvent`] inside a
//! [`SerializedEvent`]; the enum tag identifies the kind, so a consumer can
//! tell a foreign kind apart from an undecodable payload.

use crate::types::{CustomerRef, PaymentStatus, PurchaseId, TicketType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticket_sync_core::event::{Event, EventError, EventMetadata, SerializedEvent};

/// A purchase intent handed to the downstream payment and inventory services.
///
/// Carries no event time: it is a command, never folded into a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequested {
    /// Caller-chosen, unique per logical purchase
    pub purchase_id: PurchaseId,
    /// Ticket category being bought
    pub ticket_type: TicketType,
    /// Number of tickets, always positive
    pub quantity: u32,
    /// Who is buying
    pub customer_ref: CustomerRef,
}

/// Current availability for one ticket type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUpdated {
    /// Ticket category
    pub ticket_type: TicketType,
    /// Tickets still available
    pub available_count: u32,
    /// When the inventory service produced this figure
    pub updated_at: DateTime<Utc>,
}

/// Payment outcome for one purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusUpdated {
    /// Purchase the payment belongs to
    pub purchase_id: PurchaseId,
    /// Reported status
    pub status: PaymentStatus,
    /// When the payment service produced this status
    pub updated_at: DateTime<Utc>,
}

/// Every envelope kind that crosses the event bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketingEvent {
    /// Outbound purchase command
    PurchaseRequested(PurchaseRequested),
    /// Inbound inventory update
    InventoryUpdated(InventoryUpdated),
    /// Inbound payment status update
    PaymentStatusUpdated(PaymentStatusUpdated),
}

impl TicketingEvent {
    /// The natural key of the envelope, also used as the partition key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::PurchaseRequested(e) => e.purchase_id.as_str(),
            Self::InventoryUpdated(e) => e.ticket_type.as_str(),
            Self::PaymentStatusUpdated(e) => e.purchase_id.as_str(),
        }
    }

    /// Event time for snapshot ordering. `None` for commands.
    #[must_use]
    pub const fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::PurchaseRequested(_) => None,
            Self::InventoryUpdated(e) => Some(e.updated_at),
            Self::PaymentStatusUpdated(e) => Some(e.updated_at),
        }
    }

    /// Wrap into a keyed wire envelope.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if encoding fails.
    pub fn to_serialized(&self, metadata: Option<EventMetadata>) -> Result<SerializedEvent, EventError> {
        Ok(SerializedEvent::from_event(self, metadata)?.with_key(self.key()))
    }

    /// Decode the payload of a wire envelope.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the payload is not a
    /// `TicketingEvent`.
    pub fn decode(event: &SerializedEvent) -> Result<Self, EventError> {
        Self::from_bytes(&event.data)
    }
}

impl Event for TicketingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::PurchaseRequested(_) => "PurchaseRequested.v1",
            Self::InventoryUpdated(_) => "InventoryUpdated.v1",
            Self::PaymentStatusUpdated(_) => "PaymentStatusUpdated.v1",
        }
    }
}

impl From<PurchaseRequested> for TicketingEvent {
    fn from(event: PurchaseRequested) -> Self {
        Self::PurchaseRequested(event)
    }
}

impl From<InventoryUpdated> for TicketingEvent {
    fn from(event: InventoryUpdated) -> Self {
        Self::InventoryUpdated(event)
    }
}

impl From<PaymentStatusUpdated> for TicketingEvent {
    fn from(event: PaymentStatusUpdated) -> Self {
        Self::PaymentStatusUpdated(event)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    #[test]
    fn keys_follow_the_natural_identifier() {
        let inventory = TicketingEvent::from(InventoryUpdated {
            ticket_type: TicketType::new("VIP"),
            available_count: 10,
            updated_at: at(1),
        });
        let status = TicketingEvent::from(PaymentStatusUpdated {
            purchase_id: PurchaseId::new("p1"),
            status: PaymentStatus::Pending,
            updated_at: at(2),
        });
        let purchase = TicketingEvent::from(PurchaseRequested {
            purchase_id: PurchaseId::new("p2"),
            ticket_type: TicketType::new("GA"),
            quantity: 2,
            customer_ref: CustomerRef::new("c-9"),
        });

        assert_eq!(inventory.key(), "VIP");
        assert_eq!(status.key(), "p1");
        assert_eq!(purchase.key(), "p2");
        assert_eq!(inventory.updated_at(), Some(at(1)));
        assert_eq!(purchase.updated_at(), None);
    }

    #[test]
    fn serialized_envelope_is_keyed_and_typed() {
        let event = TicketingEvent::from(PaymentStatusUpdated {
            purchase_id: PurchaseId::new("p1"),
            status: PaymentStatus::Succeeded,
            updated_at: at(5),
        });

        let wire = event.to_serialized(None).expect("encode");

        assert_eq!(wire.event_type, "PaymentStatusUpdated.v1");
        assert_eq!(wire.key.as_deref(), Some("p1"));
        assert_eq!(TicketingEvent::decode(&wire).expect("decode"), event);
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let wire = SerializedEvent::new("InventoryUpdated.v1".to_string(), vec![0xde, 0xad], None);
        assert!(matches!(
            TicketingEvent::decode(&wire),
            Err(EventError::DeserializationError(_))
        ));
    }
}
