use thiserror::Error;

use crate::traits::data_objects::DedupStatus;

#[derive(Debug, Clone, Error)]
pub enum DedupError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Webhook event was never registered: {0}")]
    EventNotFound(String),
}

impl From<sqlx::Error> for DedupError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Delivery-level dedup for webhook event ids.
///
/// This is the cheap first gate. It cannot replace the business-level
/// idempotency keys (an event can die mid-handling and be re-run), but it
/// lets fully-processed duplicates be acknowledged without touching any
/// handler.
#[allow(async_fn_in_trait)]
pub trait EventDedup {
    /// Registers a delivery attempt. `Fresh` means the id was unseen and is
    /// now marked processing.
    async fn begin_event(&self, event_id: &str, event_type: &str) -> Result<DedupStatus, DedupError>;

    /// Marks the event fully handled. Safe to call more than once.
    async fn complete_event(&self, event_id: &str) -> Result<(), DedupError>;
}
