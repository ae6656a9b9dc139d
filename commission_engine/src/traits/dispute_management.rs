use thiserror::Error;

use crate::{
    db_types::{DisputeRecord, DisputeStatusEntry},
    traits::data_objects::{DisputeTransition, DisputeUpdate},
};

#[derive(Debug, Clone, Error)]
pub enum DisputeError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Dispute does not exist: {0}")]
    DisputeNotFound(String),
}

impl From<sqlx::Error> for DisputeError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Tracks processor disputes through their lifecycle.
#[allow(async_fn_in_trait)]
pub trait DisputeManagement {
    /// Applies one dispute notification. Creates the record if the id is new,
    /// appends to the status history only when the status actually changed,
    /// and sets the outcome at most once when the dispute closes. All of that
    /// happens in one transaction, and replaying the same notification is a
    /// no-op (reported through the returned [`DisputeTransition`]).
    async fn record_dispute_event(&self, update: DisputeUpdate) -> Result<DisputeTransition, DisputeError>;

    async fn fetch_dispute(&self, dispute_id: &str) -> Result<Option<DisputeRecord>, DisputeError>;

    /// The append-only status history, oldest first.
    async fn dispute_history(&self, dispute_id: &str) -> Result<Vec<DisputeStatusEntry>, DisputeError>;
}
