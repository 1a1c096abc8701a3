//! Point lookups against the two read models.

use crate::snapshot::{Snapshot, SnapshotReader};
use crate::types::{PaymentStatus, PurchaseId, TicketType};
use thiserror::Error;

/// Query failures surfaced to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The key has never been observed on its stream
    #[error("no {kind} known for {key}")]
    NotFound {
        /// Which read model was queried
        kind: &'static str,
        /// Key that was looked up
        key: String,
    },
}

/// Read side of the service. Cheap to clone; never blocks on ingestion.
#[derive(Clone, Debug)]
pub struct QueryService {
    inventory: SnapshotReader<TicketType, u32>,
    status: SnapshotReader<PurchaseId, PaymentStatus>,
}

impl QueryService {
    /// Build a query service over the two store readers.
    #[must_use]
    pub const fn new(
        inventory: SnapshotReader<TicketType, u32>,
        status: SnapshotReader<PurchaseId, PaymentStatus>,
    ) -> Self {
        Self { inventory, status }
    }

    /// Latest available count for `ticket_type`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotFound`] if no inventory update was seen for it.
    pub fn get_inventory(&self, ticket_type: &str) -> Result<Snapshot<u32>, QueryError> {
        self.inventory.get(ticket_type).ok_or_else(|| QueryError::NotFound {
            kind: "inventory",
            key: ticket_type.to_string(),
        })
    }

    /// Latest payment status for `purchase_id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotFound`] if no status update was seen for it.
    pub fn get_status(&self, purchase_id: &str) -> Result<Snapshot<PaymentStatus>, QueryError> {
        self.status.get(purchase_id).ok_or_else(|| QueryError::NotFound {
            kind: "payment status",
            key: purchase_id.to_string(),
        })
    }
}
