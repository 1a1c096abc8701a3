//! Event trait and the wire envelope carried by the event bus.
//!
//! Events represent facts about things that have happened and are immutable
//! once constructed. They travel between services as a [`SerializedEvent`]:
//! a type tag, an optional partition key and the bincode-encoded payload.
//!
//! # Design
//!
//! Payloads are serialized with `bincode`. Every producer and consumer in the
//! workspace is Rust, so a compact binary format is preferred over JSON:
//!
//! - faster to encode and decode than JSON
//! - smaller on the wire
//! - schema lives in the Rust types themselves
//!
//! # Example
//!
//! ```
//! use ticket_sync_core::event::Event;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! enum StockEvent {
//!     Restocked { sku: String, count: u32 },
//! }
//!
//! impl Event for StockEvent {
//!     fn event_type(&self) -> &'static str {
//!         match self {
//!             StockEvent::Restocked { .. } => "Restocked.v1",
//!         }
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// An event that can be shipped over the event bus.
///
/// # Event Naming Convention
///
/// `event_type()` returns a stable identifier with a version suffix so that
/// consumers can recognise schema changes:
///
/// - `"InventoryUpdated.v1"`
/// - `"PaymentStatusUpdated.v1"`
///
/// # Thread Safety
///
/// Events must be `Send + Sync + 'static` to cross task boundaries in the
/// async runtime.
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier for this event.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes are corrupted,
    /// belong to a different type, or were written by an incompatible schema.
    ///
    /// # Examples
    ///
    /// ```
    /// use ticket_sync_core::event::Event;
    /// # use serde::{Serialize, Deserialize};
    /// # #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    /// # enum StockEvent {
    /// #     Restocked { sku: String, count: u32 },
    /// # }
    /// # impl Event for StockEvent {
    /// #     fn event_type(&self) -> &'static str { "Restocked.v1" }
    /// # }
    ///
    /// let original = StockEvent::Restocked { sku: "VIP".to_string(), count: 3 };
    /// let bytes = original.to_bytes().unwrap();
    /// assert_eq!(StockEvent::from_bytes(&bytes).unwrap(), original);
    ///
    /// assert!(StockEvent::from_bytes(&[0xff]).is_err());
    /// ```
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// Metadata attached to a serialized event.
///
/// A plain struct rather than free-form JSON so the whole envelope stays
/// bincode-compatible.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Links related events across services
    pub correlation_id: Option<String>,
    /// Identifier of the event or command that caused this one
    pub causation_id: Option<String>,
    /// When the event was created (RFC 3339)
    pub timestamp: Option<String>,
}

/// A serialized event ready for the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// The event type identifier (e.g., "InventoryUpdated.v1").
    pub event_type: String,

    /// Partition key. Messages with the same key keep their relative order.
    /// When absent, the bus falls back to `event_type`.
    pub key: Option<String>,

    /// The bincode-serialized event data.
    pub data: Vec<u8>,

    /// Optional metadata.
    pub metadata: Option<EventMetadata>,
}

impl SerializedEvent {
    /// Create a new serialized event without a partition key.
    ///
    /// # Examples
    ///
    /// ```
    /// use ticket_sync_core::event::SerializedEvent;
    ///
    /// let event = SerializedEvent::new("InventoryUpdated.v1".to_string(), vec![1, 2, 3], None);
    /// assert_eq!(event.partition_key(), "InventoryUpdated.v1");
    /// ```
    #[must_use]
    pub const fn new(event_type: String, data: Vec<u8>, metadata: Option<EventMetadata>) -> Self {
        Self {
            event_type,
            key: None,
            data,
            metadata,
        }
    }

    /// Set the partition key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The key the bus should partition on.
    #[must_use]
    pub fn partition_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.event_type)
    }

    /// Create a serialized event from an `Event`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<EventMetadata>,
    ) -> Result<Self, EventError> {
        Ok(Self::new(event.event_type().to_string(), event.to_bytes()?, metadata))
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, key: {}, size: {} bytes }}",
            self.event_type,
            self.partition_key(),
            self.data.len()
        )
    }
}
