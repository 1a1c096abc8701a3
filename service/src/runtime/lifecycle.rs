//! Application lifecycle management and graceful shutdown.
//!
//! The `Application` owns both ingestion consumers:
//!
//! 1. **Startup**: spawn every consumer
//! 2. **Runtime**: wait for Ctrl+C, SIGTERM or a [`ShutdownHandle`]
//! 3. **Shutdown**: broadcast the signal, then join each consumer with a
//!    bounded timeout
//!
//! # Example
//!
//! ```rust,ignore
//! let read_model = ReadModelBuilder::new(config, event_bus).build()?;
//! read_model.application.run().await;
//! ```

use crate::runtime::{ConsumerState, EventConsumer};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

/// Triggers the same graceful shutdown as an OS signal.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Request shutdown. Calling it more than once is harmless.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// Running application with all background consumers.
pub struct Application {
    /// Ingestion consumers, not yet spawned
    consumers: Vec<EventConsumer>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,

    /// Own subscription, so a [`ShutdownHandle`] can end `run`
    shutdown_rx: broadcast::Receiver<()>,

    /// How long each consumer gets to stop
    shutdown_timeout: Duration,
}

impl Application {
    /// Create a new application.
    ///
    /// `consumers` must have been built with receivers of `shutdown_tx`.
    #[must_use]
    pub fn new(
        consumers: Vec<EventConsumer>,
        shutdown_tx: broadcast::Sender<()>,
        shutdown_timeout: Duration,
    ) -> Self {
        let shutdown_rx = shutdown_tx.subscribe();
        Self {
            consumers,
            shutdown_tx,
            shutdown_rx,
            shutdown_timeout,
        }
    }

    /// Handle that stops the application without an OS signal.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Lifecycle watchers, one per consumer, keyed by consumer name.
    #[must_use]
    pub fn consumer_states(&self) -> Vec<(String, watch::Receiver<ConsumerState>)> {
        self.consumers
            .iter()
            .map(|c| (c.name().to_string(), c.state()))
            .collect()
    }

    /// Run until Ctrl+C, SIGTERM or a [`ShutdownHandle`] fires.
    pub async fn run(self) {
        self.run_until(shutdown_signal()).await;
    }

    /// Run until `signal` completes or a [`ShutdownHandle`] fires.
    pub async fn run_until<F>(mut self, signal: F)
    where
        F: Future<Output = ()> + Send,
    {
        info!(consumer_count = self.consumers.len(), "Starting event consumers");
        let handles: Vec<_> = self
            .consumers
            .into_iter()
            .map(|consumer| {
                let name = consumer.name().to_string();
                (name, consumer.spawn())
            })
            .collect();

        tokio::select! {
            () = signal => {}
            _ = self.shutdown_rx.recv() => info!("Shutdown requested"),
        }

        info!("Initiating graceful shutdown...");
        let _ = self.shutdown_tx.send(());

        Self::await_shutdown(handles, self.shutdown_timeout).await;
        info!("Graceful shutdown complete");
    }

    async fn await_shutdown(handles: Vec<(String, tokio::task::JoinHandle<()>)>, timeout: Duration) {
        for (name, handle) in handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => info!(consumer = %name, "Consumer stopped gracefully"),
                Ok(Err(e)) => warn!(consumer = %name, error = %e, "Consumer task failed"),
                Err(_) => warn!(consumer = %name, "Consumer shutdown timed out"),
            }
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A signal whose handler cannot be installed never fires; the error is
/// logged and the other signal still works.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
