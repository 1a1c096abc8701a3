//! # Ticket Sync Core
//!
//! Core traits and types shared by the ticket-sync crates.
//!
//! This crate provides the abstractions that every other crate in the
//! workspace builds on:
//!
//! - **Event**: a domain fact that can be serialized and shipped over a stream
//! - **`SerializedEvent`**: the wire envelope carried by the event bus
//! - **`EventBus`**: publish/subscribe over named topics
//! - **Clock**: injected time source so timestamps stay testable
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   publish    ┌──────────────┐   subscribe   ┌──────────────┐
//! │   Command    │ ───────────► │   EventBus   │ ────────────► │  Ingestion   │
//! │   Emitter    │              │  (Redpanda)  │               │  Consumers   │
//! └──────────────┘              └──────────────┘               └──────────────┘
//! ```

pub mod event;
pub mod event_bus;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Environment module - dependency injection traits
///
/// External dependencies that affect determinism are abstracted behind traits
/// and injected into the components that need them.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use ticket_sync_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = chrono::Utc::now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
