//! Generic event bus consumer with automatic reconnection.
//!
//! `EventConsumer` owns the boilerplate of consuming a stream: subscribing
//! with retry, handing every envelope to its [`EventHandler`], reconnecting
//! when the stream ends, and stopping on a shutdown broadcast.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! STOPPED ──spawn──▶ RUNNING ──shutdown──▶ STOPPED
//!
//! loop {
//!     subscribe (retry after delay on failure)
//!     loop {
//!         next envelope ─▶ handler (decode failure: log, count, continue)
//!         undecodable bus item ─▶ log, count, continue
//!     }
//!     stream ended ─▶ wait and resubscribe
//! }
//! ```
//!
//! Envelopes are handled strictly one at a time. Shutdown is only observed
//! between envelopes, so an envelope already taken off the stream is always
//! applied before the consumer reports `Stopped`.

use super::EventHandler;
use crate::metrics;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use ticket_sync_core::event_bus::{EventBus, EventBusError, EventStream};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

/// Default delay before resubscribing after a failure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Observable lifecycle of a consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    /// Not consuming: not yet spawned, or shut down
    Stopped,
    /// Subscribed or trying to subscribe
    Running,
}

/// Why a stream-processing pass ended.
enum StreamEnd {
    Shutdown,
    Disconnected,
}

/// Generic event bus consumer.
///
/// Created with [`EventConsumer::new`], then moved into a background task by
/// [`spawn`](Self::spawn). Runs until the shutdown broadcast fires (or its
/// sender is dropped).
pub struct EventConsumer {
    /// Consumer name (for logging)
    name: String,

    /// Topics to subscribe to
    topics: Vec<String>,

    /// Event bus to consume from
    event_bus: Arc<dyn EventBus>,

    /// Handler for processing events
    handler: Arc<dyn EventHandler>,

    /// Shutdown signal receiver
    shutdown: broadcast::Receiver<()>,

    /// Retry delay on connection failure
    retry_delay: Duration,

    /// Lifecycle publisher
    state: watch::Sender<ConsumerState>,
}

impl EventConsumer {
    /// Create a new event consumer with the default retry delay.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let consumer = EventConsumer::new(
    ///     "inventory",
    ///     vec!["ticketing-inventory-updates".to_string()],
    ///     event_bus,
    ///     handler,
    ///     shutdown_rx,
    /// );
    /// ```
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<String>,
        event_bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let (state, _) = watch::channel(ConsumerState::Stopped);
        Self {
            name: name.into(),
            topics,
            event_bus,
            handler,
            shutdown,
            retry_delay: DEFAULT_RETRY_DELAY,
            state,
        }
    }

    /// Set custom retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Consumer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Watch the consumer's lifecycle. Take this before [`spawn`](Self::spawn).
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Spawn the consumer as a background task.
    ///
    /// The returned handle completes once the consumer has stopped.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        self.state.send_replace(ConsumerState::Running);
        info!(consumer = %self.name, topics = ?self.topics, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            let subscribe_result = tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal");
                    break;
                }
                result = self.event_bus.subscribe(&topics) => result,
            };

            match subscribe_result {
                Ok(mut stream) => {
                    info!(consumer = %self.name, topics = ?self.topics, "Subscribed to event bus");
                    match self.process_stream(&mut stream).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Disconnected => warn!(
                            consumer = %self.name,
                            "Event stream ended, reconnecting in {:?}",
                            self.retry_delay
                        ),
                    }
                },
                Err(e) => error!(
                    consumer = %self.name,
                    error = %e,
                    "Failed to subscribe to event bus, retrying in {:?}",
                    self.retry_delay
                ),
            }

            if !self.wait_before_retry().await {
                break;
            }
        }

        self.state.send_replace(ConsumerState::Stopped);
        info!(consumer = %self.name, "Event consumer stopped");
    }

    /// Process envelopes until the stream ends or shutdown is signalled.
    async fn process_stream(&mut self, stream: &mut EventStream) -> StreamEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal during processing");
                    return StreamEnd::Shutdown;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    // Not raced against shutdown: an envelope taken off the
                    // stream is always applied.
                    if let Err(e) = self.handler.handle(&event).await {
                        error!(
                            consumer = %self.name,
                            event_type = %event.event_type,
                            key = ?event.key,
                            error = %e,
                            "Failed to handle event"
                        );
                        metrics::record_decode_failure(self.handler.stream());
                    }
                },
                Some(Err(e @ EventBusError::DeserializationFailed(_))) => {
                    error!(consumer = %self.name, error = %e, "Skipping undecodable envelope");
                    metrics::record_decode_failure(self.handler.stream());
                },
                Some(Err(e)) => {
                    error!(consumer = %self.name, error = %e, "Error receiving event from stream");
                },
                None => return StreamEnd::Disconnected,
            }
        }
    }

    /// Sleep for the retry delay. Returns `false` if shutdown arrived first.
    async fn wait_before_retry(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.recv() => {
                info!(consumer = %self.name, "Event consumer received shutdown signal while waiting to retry");
                false
            }
            () = tokio::time::sleep(self.retry_delay) => true,
        }
    }
}
