//! Ticket Sync - read-model synchronization for the ticketing purchase flow
//!
//! A client submits a purchase synchronously; the payment and inventory
//! services later report back on their own streams. This crate folds those
//! reports into two queryable read models:
//!
//! - **Inventory by ticket type**: latest available count
//! - **Payment status by purchase id**: latest `PENDING`/`SUCCEEDED`/`FAILED`
//!
//! # Architecture
//!
//! ```text
//! Command Side:
//!   submit ──▶ CommandEmitter ──▶ purchase topic ──▶ (payment / inventory services)
//!                                                              │
//!                                  ┌───────────────────────────┴───────────┐
//!                                  ▼                                       ▼
//! Read Side:               inventory topic                          status topic
//!                                  │                                       │
//!                          inventory consumer                      status consumer
//!                                  │ put                                   │ put
//!                                  ▼                                       ▼
//!                          inventory store ────────▶ QueryService ◀──── status store
//! ```
//!
//! The emitter and the stores are never coupled directly: a submitted
//! purchase becomes readable only once its status comes back on the stream.
//!
//! # Consistency
//!
//! Each store keeps, per key, the value of the event with the greatest
//! `updated_at` seen so far. Older events arriving late are dropped,
//! duplicates are harmless, and the two stores are updated independently.
//!
//! # Example
//!
//! ```rust,ignore
//! let event_bus: Arc<dyn EventBus> = Arc::new(RedpandaEventBus::new("localhost:9092")?);
//! let read_model = ReadModelBuilder::new(Config::from_env(), event_bus).build()?;
//!
//! let ack = read_model.emitter.submit(request).await?;
//! let status = read_model.query.get_status(ack.purchase_id.as_str());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod emitter;
pub mod events;
pub mod metrics;
pub mod query;
pub mod runtime;
pub mod snapshot;
pub mod types;

pub use bootstrap::{ReadModel, ReadModelBuilder};
pub use config::{Config, ConfigError};
pub use emitter::{CommandEmitter, PurchaseRequest, SubmissionAck, SubmitError};
pub use events::{InventoryUpdated, PaymentStatusUpdated, PurchaseRequested, TicketingEvent};
pub use query::{QueryError, QueryService};
pub use snapshot::{PutOutcome, Snapshot, SnapshotReader, SnapshotStore};
pub use types::*;
