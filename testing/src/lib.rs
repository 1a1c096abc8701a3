//! # Ticket Sync Testing
//!
//! Testing utilities for the ticket-sync crates.
//!
//! This crate provides:
//! - [`FixedClock`] / [`test_clock`]: deterministic time
//! - [`InMemoryEventBus`]: topic-based pub/sub with replay, publish capture
//!   and simulated broker outages
//!
//! ## Example
//!
//! ```ignore
//! use ticket_sync_testing::{InMemoryEventBus, test_clock};
//!
//! #[tokio::test]
//! async fn consumer_applies_status() {
//!     let bus = Arc::new(InMemoryEventBus::new());
//!     bus.publish("ticketing-payment-status", &envelope).await?;
//!     // spawn the consumer, then query the store
//! }
//! ```

pub mod event_bus;

use chrono::{DateTime, Utc};
use ticket_sync_core::environment::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    pub use crate::event_bus::InMemoryEventBus;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_sync_testing::mocks::FixedClock;
    /// use ticket_sync_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }
}

// Re-export commonly used items
pub use event_bus::InMemoryEventBus;
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
