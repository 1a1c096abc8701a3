//! Runtime components of the read-model service.
//!
//! - **`consumer`**: generic event bus consumer with automatic reconnection
//! - **`handlers`**: handler trait and the two projection handlers
//! - **`lifecycle`**: application lifecycle and graceful shutdown

pub mod consumer;
pub mod handlers;
pub mod lifecycle;

pub use consumer::{ConsumerState, EventConsumer};
pub use handlers::{EventHandler, HandlerError, InventoryProjectionHandler, PaymentStatusProjectionHandler};
pub use lifecycle::{Application, ShutdownHandle};
