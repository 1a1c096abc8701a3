//! End-to-end tests of the read models over the in-memory event bus.
//!
//! Each test wires the full service with `ReadModelBuilder`, drives the
//! inbound topics like the external payment and inventory services would,
//! and observes the results through `QueryService`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{
    INVENTORY_TOPIC, PURCHASE_TOPIC, Running, STATUS_TOPIC, at, eventually, inventory_event, status_event,
};
use ticket_sync::runtime::ConsumerState;
use ticket_sync::{PaymentStatus, PurchaseRequest, QueryError, SubmitError};
use ticket_sync_core::event::SerializedEvent;
use ticket_sync_core::event_bus::EventBus;
use ticket_sync_testing::InMemoryEventBus;

// ============================================================================
// Status and inventory lookups
// ============================================================================

#[tokio::test]
async fn status_is_not_found_until_its_update_arrives() {
    let app = Running::start(InMemoryEventBus::new()).await;

    assert_eq!(
        app.query.get_status("p1"),
        Err(QueryError::NotFound {
            kind: "payment status",
            key: "p1".to_string()
        })
    );

    app.bus
        .publish(STATUS_TOPIC, &status_event("p1", PaymentStatus::Succeeded, 1))
        .await
        .unwrap();
    eventually(|| app.query.get_status("p1").is_ok()).await;

    let snapshot = app.query.get_status("p1").unwrap();
    assert_eq!(snapshot.value, PaymentStatus::Succeeded);
    assert_eq!(snapshot.updated_at, at(1));

    app.stop().await;
}

#[tokio::test]
async fn late_inventory_update_with_older_time_is_rejected() {
    let app = Running::start(InMemoryEventBus::new()).await;

    app.bus.publish(INVENTORY_TOPIC, &inventory_event("VIP", 10, 100)).await.unwrap();
    app.bus.publish(INVENTORY_TOPIC, &inventory_event("VIP", 8, 50)).await.unwrap();
    // The consumer is sequential, so once the marker is visible both VIP
    // updates have been applied.
    app.bus.publish(INVENTORY_TOPIC, &inventory_event("marker", 0, 1)).await.unwrap();
    eventually(|| app.query.get_inventory("marker").is_ok()).await;

    let snapshot = app.query.get_inventory("VIP").unwrap();
    assert_eq!(snapshot.value, 10);
    assert_eq!(snapshot.updated_at, at(100));

    app.stop().await;
}

#[tokio::test]
async fn newer_update_replaces_older_one() {
    let app = Running::start(InMemoryEventBus::new()).await;

    app.bus
        .publish(STATUS_TOPIC, &status_event("p1", PaymentStatus::Pending, 1))
        .await
        .unwrap();
    app.bus
        .publish(STATUS_TOPIC, &status_event("p1", PaymentStatus::Failed, 2))
        .await
        .unwrap();

    eventually(|| app.query.get_status("p1").is_ok_and(|s| s.value == PaymentStatus::Failed)).await;

    app.stop().await;
}

#[tokio::test]
async fn stores_are_independent() {
    let app = Running::start(InMemoryEventBus::new()).await;

    // Same key string on both streams.
    app.bus.publish(INVENTORY_TOPIC, &inventory_event("X", 5, 1)).await.unwrap();
    eventually(|| app.query.get_inventory("X").is_ok()).await;
    assert!(app.query.get_status("X").is_err());

    app.bus
        .publish(STATUS_TOPIC, &status_event("X", PaymentStatus::Pending, 1))
        .await
        .unwrap();
    eventually(|| app.query.get_status("X").is_ok()).await;
    assert_eq!(app.query.get_inventory("X").unwrap().value, 5);

    app.stop().await;
}

// ============================================================================
// Ingestion resilience
// ============================================================================

#[tokio::test]
async fn undecodable_envelope_is_skipped() {
    let app = Running::start(InMemoryEventBus::new()).await;

    let garbage = SerializedEvent::new("PaymentStatusUpdated.v1".to_string(), vec![0xff], None);
    app.bus.publish(STATUS_TOPIC, &garbage).await.unwrap();
    app.bus
        .publish(STATUS_TOPIC, &status_event("p1", PaymentStatus::Succeeded, 1))
        .await
        .unwrap();

    eventually(|| app.query.get_status("p1").is_ok()).await;
    for (name, state) in &app.states {
        assert_eq!(*state.borrow(), ConsumerState::Running, "consumer {name}");
    }

    app.stop().await;
}

#[tokio::test]
async fn duplicate_delivery_leaves_the_store_unchanged() {
    let app = Running::start(InMemoryEventBus::new()).await;

    let update = inventory_event("GA", 40, 10);
    app.bus.publish(INVENTORY_TOPIC, &update).await.unwrap();
    eventually(|| app.query.get_inventory("GA").is_ok()).await;
    let first = app.query.get_inventory("GA").unwrap();

    app.bus.publish(INVENTORY_TOPIC, &update).await.unwrap();
    app.bus.publish(INVENTORY_TOPIC, &inventory_event("marker", 0, 1)).await.unwrap();
    eventually(|| app.query.get_inventory("marker").is_ok()).await;

    assert_eq!(app.query.get_inventory("GA").unwrap(), first);

    app.stop().await;
}

#[tokio::test]
async fn consumer_resubscribes_after_disconnect() {
    let app = Running::start(InMemoryEventBus::new()).await;

    app.bus.publish(INVENTORY_TOPIC, &inventory_event("VIP", 10, 1)).await.unwrap();
    eventually(|| app.query.get_inventory("VIP").is_ok()).await;

    app.bus.disconnect_subscribers();
    app.bus.publish(INVENTORY_TOPIC, &inventory_event("VIP", 9, 2)).await.unwrap();

    eventually(|| app.query.get_inventory("VIP").is_ok_and(|s| s.value == 9)).await;
    eventually(|| app.bus.subscriber_count(INVENTORY_TOPIC) == 1).await;

    app.stop().await;
}

#[tokio::test]
async fn existing_stream_is_replayed_at_startup() {
    let bus = InMemoryEventBus::new();
    bus.publish(INVENTORY_TOPIC, &inventory_event("VIP", 3, 7)).await.unwrap();
    bus.publish(STATUS_TOPIC, &status_event("p9", PaymentStatus::Failed, 7))
        .await
        .unwrap();

    let app = Running::start(bus).await;
    eventually(|| app.query.get_inventory("VIP").is_ok() && app.query.get_status("p9").is_ok()).await;
    assert_eq!(app.query.get_inventory("VIP").unwrap().value, 3);

    app.stop().await;
}

#[tokio::test]
async fn shutdown_stops_both_consumers() {
    let app = Running::start(InMemoryEventBus::new()).await;
    let bus = app.bus.clone();
    let query = app.query.clone();

    let states = app.stop().await;
    for (name, state) in &states {
        assert_eq!(*state.borrow(), ConsumerState::Stopped, "consumer {name}");
    }

    bus.publish(STATUS_TOPIC, &status_event("p1", PaymentStatus::Succeeded, 1))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(query.get_status("p1").is_err());
}

// ============================================================================
// Purchase submission
// ============================================================================

fn purchase(purchase_id: &str) -> PurchaseRequest {
    PurchaseRequest {
        purchase_id: purchase_id.to_string(),
        ticket_type: "GA".to_string(),
        quantity: 2,
        customer_ref: "c-1".to_string(),
    }
}

#[tokio::test]
async fn submit_acknowledges_when_stream_is_reachable() {
    let app = Running::start(InMemoryEventBus::new()).await;

    let ack = app.emitter.submit(purchase("p2")).await.unwrap();
    assert_eq!(ack.purchase_id.as_str(), "p2");
    assert_eq!(ack.topic, PURCHASE_TOPIC);
    assert_eq!(app.bus.published(PURCHASE_TOPIC).len(), 1);

    // Submitting never writes a snapshot.
    assert!(app.query.get_status("p2").is_err());
    assert!(app.query.get_inventory("GA").is_err());

    app.stop().await;
}

#[tokio::test]
async fn submit_fails_retryably_when_stream_is_unreachable() {
    let app = Running::start(InMemoryEventBus::new()).await;
    app.bus.set_available(false);

    let err = app.emitter.submit(purchase("p2")).await.unwrap_err();
    assert!(matches!(err, SubmitError::PublishFailed { .. }));
    assert!(err.is_retryable());

    assert!(app.bus.published(PURCHASE_TOPIC).is_empty());
    assert!(app.query.get_status("p2").is_err());
    assert!(app.query.get_inventory("GA").is_err());

    app.bus.set_available(true);
    app.stop().await;
}
