//! Shared fixtures for the service integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use ticket_sync::runtime::{ConsumerState, ShutdownHandle};
use ticket_sync::{
    CommandEmitter, Config, InventoryUpdated, PaymentStatus, PaymentStatusUpdated, PurchaseId, QueryService,
    ReadModelBuilder, TicketType, TicketingEvent,
};
use ticket_sync_core::event::SerializedEvent;
use ticket_sync_testing::{InMemoryEventBus, test_clock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const INVENTORY_TOPIC: &str = "ticketing-inventory-updates";
pub const STATUS_TOPIC: &str = "ticketing-payment-status";
pub const PURCHASE_TOPIC: &str = "ticketing-purchase-requests";

/// Event time `secs` seconds after the epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("valid timestamp")
}

pub fn inventory_event(ticket_type: &str, available_count: u32, secs: i64) -> SerializedEvent {
    TicketingEvent::from(InventoryUpdated {
        ticket_type: TicketType::new(ticket_type),
        available_count,
        updated_at: at(secs),
    })
    .to_serialized(None)
    .unwrap()
}

pub fn status_event(purchase_id: &str, status: PaymentStatus, secs: i64) -> SerializedEvent {
    TicketingEvent::from(PaymentStatusUpdated {
        purchase_id: PurchaseId::new(purchase_id),
        status,
        updated_at: at(secs),
    })
    .to_serialized(None)
    .unwrap()
}

/// Default topics, fast retries.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.consumer.retry_delay_ms = 10;
    config.server.shutdown_timeout = 2;
    config
}

/// A read model running over an in-memory bus.
pub struct Running {
    pub bus: InMemoryEventBus,
    pub query: QueryService,
    pub emitter: CommandEmitter,
    pub states: Vec<(String, watch::Receiver<ConsumerState>)>,
    shutdown: ShutdownHandle,
    task: JoinHandle<()>,
}

impl Running {
    /// Wire and start both consumers; returns once both report `Running`.
    pub async fn start(bus: InMemoryEventBus) -> Self {
        let read_model = ReadModelBuilder::new(test_config(), Arc::new(bus.clone()))
            .clock(Arc::new(test_clock()))
            .build()
            .unwrap();

        let states = read_model.application.consumer_states();
        let shutdown = read_model.application.shutdown_handle();
        let task = tokio::spawn(read_model.application.run_until(std::future::pending()));

        for (_, state) in &states {
            state.clone().wait_for(|s| *s == ConsumerState::Running).await.unwrap();
        }

        Self {
            bus,
            query: read_model.query,
            emitter: read_model.emitter,
            states,
            shutdown,
            task,
        }
    }

    /// Trigger graceful shutdown and wait for it to complete.
    pub async fn stop(self) -> Vec<(String, watch::Receiver<ConsumerState>)> {
        self.shutdown.shutdown();
        self.task.await.unwrap();
        self.states
    }
}

/// Poll `check` until it holds, failing the test after five seconds.
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met within 5s");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
