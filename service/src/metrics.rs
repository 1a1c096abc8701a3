//! Operational metrics for the read-model service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ticket_sync_events_applied_total{stream,outcome}` - Envelopes folded into a store, by put outcome
//! - `ticket_sync_decode_failures_total{stream}` - Envelopes skipped because they could not be decoded
//! - `ticket_sync_purchases_submitted_total{result}` - Purchase submissions by result
//!
//! ## Gauges
//! - `ticket_sync_snapshot_keys{stream}` - Keys currently held by each store
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use crate::snapshot::PutOutcome;
use metrics::{describe_counter, describe_gauge};

/// Register descriptions for every metric. Call once at startup.
pub fn register_metrics() {
    describe_counter!(
        "ticket_sync_events_applied_total",
        "Total envelopes folded into a snapshot store by outcome (inserted, updated, stale)"
    );
    describe_counter!(
        "ticket_sync_decode_failures_total",
        "Total envelopes skipped because their payload could not be decoded"
    );
    describe_counter!(
        "ticket_sync_purchases_submitted_total",
        "Total purchase submissions by result (accepted, invalid, failed)"
    );
    describe_gauge!(
        "ticket_sync_snapshot_keys",
        "Number of keys currently held by a snapshot store"
    );

    tracing::info!("Metrics registered");
}

/// Record one store put.
pub fn record_event_applied(stream: &'static str, outcome: PutOutcome) {
    metrics::counter!(
        "ticket_sync_events_applied_total",
        "stream" => stream,
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record an undecodable envelope.
pub fn record_decode_failure(stream: &'static str) {
    metrics::counter!("ticket_sync_decode_failures_total", "stream" => stream).increment(1);
}

/// Record a purchase submission. `result` is `accepted`, `invalid` or `failed`.
pub fn record_purchase_submitted(result: &'static str) {
    metrics::counter!("ticket_sync_purchases_submitted_total", "result" => result).increment(1);
}

/// Publish the current key count of a store.
#[allow(clippy::cast_precision_loss)] // Key counts stay far below 2^52
pub fn set_snapshot_keys(stream: &'static str, keys: usize) {
    metrics::gauge!("ticket_sync_snapshot_keys", "stream" => stream).set(keys as f64);
}
