//! Ticket sync service.
//!
//! Keeps the inventory and payment status read models current from
//! Redpanda until Ctrl+C or SIGTERM.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use ticket_sync::{Config, ReadModelBuilder, metrics::register_metrics};
use ticket_sync_core::event_bus::EventBus;
use ticket_sync_redpanda::RedpandaEventBus;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = Config::from_env();

    // Initialize tracing; RUST_LOG wins over LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ticket sync service");

    config.validate()?;
    info!(
        redpanda_brokers = %config.redpanda.brokers,
        consumer_group = %config.redpanda.consumer_group,
        "Configuration loaded"
    );

    // Metrics
    let metrics_addr: SocketAddr = config.metrics_address().parse()?;
    PrometheusBuilder::new().with_http_listener(metrics_addr).install()?;
    register_metrics();
    info!(address = %metrics_addr, "Metrics endpoint listening");

    // Setup event bus
    info!("Connecting to Redpanda event bus...");
    let event_bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&config.redpanda.brokers)
            .consumer_group(&config.redpanda.consumer_group)
            .auto_offset_reset(&config.redpanda.auto_offset_reset)
            .producer_acks(&config.redpanda.producer_acks)
            .compression(&config.redpanda.compression)
            .timeout(config.producer_timeout())
            .buffer_size(config.redpanda.buffer_size)
            .build()?,
    );
    info!("Event bus connected");

    let read_model = ReadModelBuilder::new(config, event_bus).build()?;
    read_model.application.run().await;

    Ok(())
}
