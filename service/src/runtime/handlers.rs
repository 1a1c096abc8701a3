//! Event handler trait and the two projection handlers.
//!
//! The `EventHandler` trait is the pluggable step of the generic
//! [`EventConsumer`](super::EventConsumer): the consumer owns the
//! subscribe-process-reconnect loop, the handler turns one wire envelope
//! into a store update.
//!
//! Each projection handler owns the write handle of its snapshot store, so
//! the consumer driving it is the store's only writer.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = SnapshotStore::new();
//! let reader = store.reader();
//! let handler = Arc::new(InventoryProjectionHandler::new(store));
//! let consumer = EventConsumer::new("inventory", topics, event_bus, handler, shutdown_rx);
//! ```

use crate::events::TicketingEvent;
use crate::metrics;
use crate::snapshot::{PutOutcome, SnapshotStore};
use crate::types::{PaymentStatus, PurchaseId, TicketType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use ticket_sync_core::event::{EventError, SerializedEvent};
use tracing::debug;

/// Errors a handler reports back to its consumer.
///
/// None of them stop the consumer: it logs, counts and moves on.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The envelope payload could not be decoded
    #[error("failed to decode {event_type} envelope: {source}")]
    Decode {
        /// Declared type of the undecodable envelope
        event_type: String,
        /// Underlying decode error
        #[source]
        source: EventError,
    },
}

/// Handler for one envelope taken off an event stream.
///
/// Implementors must be `Send + Sync + 'static` because handlers are shared
/// with the consumer's background task.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Stream label used in logs and metrics (e.g. `"inventory"`).
    fn stream(&self) -> &'static str;

    /// Handle one envelope.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Decode`] if the payload is malformed.
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError>;
}

/// Folds `InventoryUpdated` envelopes into the inventory-by-ticket-type
/// store.
#[derive(Debug)]
pub struct InventoryProjectionHandler {
    store: SnapshotStore<TicketType, u32>,
}

impl InventoryProjectionHandler {
    /// Stream label for the inventory stream.
    pub const STREAM: &'static str = "inventory";

    /// Take ownership of the store's write handle.
    #[must_use]
    pub const fn new(store: SnapshotStore<TicketType, u32>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for InventoryProjectionHandler {
    fn stream(&self) -> &'static str {
        Self::STREAM
    }

    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let TicketingEvent::InventoryUpdated(update) = decode(event)? else {
            skip_foreign(Self::STREAM, event);
            return Ok(());
        };

        let key = update.ticket_type.to_string();
        let outcome = self
            .store
            .put(update.ticket_type, update.available_count, update.updated_at);
        record(Self::STREAM, &key, update.updated_at, outcome, self.store.len());
        Ok(())
    }
}

/// Folds `PaymentStatusUpdated` envelopes into the status-by-purchase-id
/// store.
#[derive(Debug)]
pub struct PaymentStatusProjectionHandler {
    store: SnapshotStore<PurchaseId, PaymentStatus>,
}

impl PaymentStatusProjectionHandler {
    /// Stream label for the payment status stream.
    pub const STREAM: &'static str = "payment_status";

    /// Take ownership of the store's write handle.
    #[must_use]
    pub const fn new(store: SnapshotStore<PurchaseId, PaymentStatus>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for PaymentStatusProjectionHandler {
    fn stream(&self) -> &'static str {
        Self::STREAM
    }

    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let TicketingEvent::PaymentStatusUpdated(update) = decode(event)? else {
            skip_foreign(Self::STREAM, event);
            return Ok(());
        };

        let key = update.purchase_id.to_string();
        let outcome = self
            .store
            .put(update.purchase_id, update.status, update.updated_at);
        record(Self::STREAM, &key, update.updated_at, outcome, self.store.len());
        Ok(())
    }
}

fn decode(event: &SerializedEvent) -> Result<TicketingEvent, HandlerError> {
    TicketingEvent::decode(event).map_err(|source| HandlerError::Decode {
        event_type: event.event_type.clone(),
        source,
    })
}

fn skip_foreign(stream: &'static str, event: &SerializedEvent) {
    debug!(
        stream,
        event_type = %event.event_type,
        key = ?event.key,
        "Skipping event that does not belong to this stream"
    );
}

fn record(stream: &'static str, key: &str, updated_at: DateTime<Utc>, outcome: PutOutcome, keys: usize) {
    if outcome.is_applied() {
        debug!(stream, key, %updated_at, outcome = outcome.as_str(), "Snapshot updated");
    } else {
        debug!(stream, key, %updated_at, "Dropped stale event");
    }
    metrics::record_event_applied(stream, outcome);
    metrics::set_snapshot_keys(stream, keys);
}
