//! Explicit wiring of the read-model service.
//!
//! ```text
//! inventory topic ──▶ inventory consumer ──put──▶ inventory store ──┐
//!                                                                   ├──▶ QueryService
//! status topic ─────▶ status consumer ─────put──▶ status store ─────┘
//!
//! CommandEmitter ──publish──▶ purchase topic
//! ```
//!
//! Every store, consumer and service is created by one call to
//! [`ReadModelBuilder::build`]; nothing is global.

use crate::config::{Config, ConfigError};
use crate::emitter::CommandEmitter;
use crate::query::QueryService;
use crate::runtime::{Application, EventConsumer, InventoryProjectionHandler, PaymentStatusProjectionHandler};
use crate::snapshot::SnapshotStore;
use std::sync::Arc;
use ticket_sync_core::environment::{Clock, SystemClock};
use ticket_sync_core::event_bus::EventBus;
use tokio::sync::broadcast;
use tracing::info;

/// Builder for the complete read model.
///
/// # Example
///
/// ```rust,ignore
/// let read_model = ReadModelBuilder::new(Config::from_env(), event_bus).build()?;
/// let query = read_model.query.clone();
/// read_model.application.run().await;
/// ```
pub struct ReadModelBuilder {
    config: Config,
    event_bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
}

/// The wired service: query side, command side and the consumers that keep
/// the query side current.
pub struct ReadModel {
    /// Point lookups against both stores
    pub query: QueryService,
    /// Outbound purchase publisher
    pub emitter: CommandEmitter,
    /// Owner of both ingestion consumers
    pub application: Application,
}

impl ReadModelBuilder {
    /// Start from a configuration and an event bus. Uses the system clock.
    #[must_use]
    pub fn new(config: Config, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            config,
            event_bus,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp submissions.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and wire everything.
    ///
    /// Consumers are created but not started; see [`Application::run`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn build(self) -> Result<ReadModel, ConfigError> {
        self.config.validate()?;
        let redpanda = &self.config.redpanda;

        let inventory_store = SnapshotStore::new();
        let status_store = SnapshotStore::new();
        let query = QueryService::new(inventory_store.reader(), status_store.reader());

        let (shutdown_tx, _) = broadcast::channel(16);
        let consumers = vec![
            EventConsumer::new(
                InventoryProjectionHandler::STREAM,
                vec![redpanda.inventory_topic.clone()],
                Arc::clone(&self.event_bus),
                Arc::new(InventoryProjectionHandler::new(inventory_store)),
                shutdown_tx.subscribe(),
            )
            .with_retry_delay(self.config.retry_delay()),
            EventConsumer::new(
                PaymentStatusProjectionHandler::STREAM,
                vec![redpanda.payment_status_topic.clone()],
                Arc::clone(&self.event_bus),
                Arc::new(PaymentStatusProjectionHandler::new(status_store)),
                shutdown_tx.subscribe(),
            )
            .with_retry_delay(self.config.retry_delay()),
        ];

        let emitter = CommandEmitter::new(Arc::clone(&self.event_bus), redpanda.purchase_topic.clone(), self.clock);

        info!(
            inventory_topic = %redpanda.inventory_topic,
            payment_status_topic = %redpanda.payment_status_topic,
            purchase_topic = %redpanda.purchase_topic,
            "Read model wired"
        );

        Ok(ReadModel {
            query,
            emitter,
            application: Application::new(consumers, shutdown_tx, self.config.shutdown_timeout()),
        })
    }
}
