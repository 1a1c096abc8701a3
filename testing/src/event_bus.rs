//! In-memory [`EventBus`] for tests.
//!
//! Every topic keeps its full log. A new subscription first replays the log
//! and then receives live events, which mirrors a Kafka consumer group that
//! starts from the earliest offset. Tests therefore never race the consumer's
//! subscribe call.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use ticket_sync_core::event::SerializedEvent;
use ticket_sync_core::event_bus::{EventBus, EventBusError, EventStream};
use tokio::sync::mpsc;

type Subscriber = mpsc::UnboundedSender<Result<SerializedEvent, EventBusError>>;

#[derive(Default)]
struct Topics {
    log: HashMap<String, Vec<SerializedEvent>>,
    subscribers: HashMap<String, Vec<Subscriber>>,
}

/// Event bus backed by in-process channels.
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use ticket_sync_core::event::SerializedEvent;
/// use ticket_sync_core::event_bus::EventBus;
/// use ticket_sync_testing::InMemoryEventBus;
///
/// # tokio_test::block_on(async {
/// let bus = InMemoryEventBus::new();
/// let event = SerializedEvent::new("Ping.v1".to_string(), vec![1], None);
/// bus.publish("pings", &event).await.unwrap();
///
/// let mut stream = bus.subscribe(&["pings"]).await.unwrap();
/// assert_eq!(stream.next().await.unwrap().unwrap(), event);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    topics: Arc<Mutex<Topics>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    /// Create an empty, reachable bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the broker going down (`false`) or coming back (`true`).
    ///
    /// While unavailable, `publish` and `subscribe` fail and nothing is
    /// recorded.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Whether the bus currently accepts publishes and subscriptions.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    /// Everything published to `topic`, in publish order.
    #[must_use]
    pub fn published(&self, topic: &str) -> Vec<SerializedEvent> {
        self.lock().log.get(topic).cloned().unwrap_or_default()
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .subscribers
            .get(topic)
            .map_or(0, |subs| subs.iter().filter(|s| !s.is_closed()).count())
    }

    /// End every open subscription stream, as if the broker dropped the
    /// connection. The topic logs are kept.
    pub fn disconnect_subscribers(&self) {
        self.lock().subscribers.clear();
    }

    /// Push a transport error into every live subscription on `topic`.
    pub fn inject_error(&self, topic: &str, error: EventBusError) {
        let mut topics = self.lock();
        if let Some(subs) = topics.subscribers.get_mut(topic) {
            subs.retain(|sub| sub.send(Err(error.clone())).is_ok());
        }
    }

    fn lock(&self) -> MutexGuard<'_, Topics> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();

        Box::pin(async move {
            if !self.is_available() {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "broker unavailable".to_string(),
                });
            }

            let mut topics = self.lock();
            if let Some(subs) = topics.subscribers.get_mut(&topic) {
                subs.retain(|sub| sub.send(Ok(event.clone())).is_ok());
            }
            topics.log.entry(topic).or_default().push(event);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topic_names: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();

        Box::pin(async move {
            if !self.is_available() {
                return Err(EventBusError::SubscriptionFailed {
                    topics: topic_names,
                    reason: "broker unavailable".to_string(),
                });
            }

            let (tx, mut rx) = mpsc::unbounded_channel();
            {
                // Replay and registration happen under one lock so no event
                // slips between the two.
                let mut state = self.lock();
                for topic in &topic_names {
                    for event in state.log.get(topic).into_iter().flatten() {
                        let _ = tx.send(Ok(event.clone()));
                    }
                    state.subscribers.entry(topic.clone()).or_default().push(tx.clone());
                }
            }
            drop(tx);

            let stream = async_stream::stream! {
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}
