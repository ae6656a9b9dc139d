use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{DlqEntry, DlqStatus, NewDeadLetter};

#[derive(Debug, Clone, Error)]
pub enum DlqError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Dead letter entry does not exist: {0}")]
    EntryNotFound(String),
    #[error("Dead letter entry {event_id} is {status}, not dead")]
    NotDead { event_id: String, status: DlqStatus },
}

impl From<sqlx::Error> for DlqError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Storage for events whose handler failed, plus the claim/ack cycle the
/// retry sweep runs against it.
#[allow(async_fn_in_trait)]
pub trait DlqManagement {
    /// Parks a failed event. Idempotent on the event id: if an entry already
    /// exists in any state it is left untouched and returned with `false`.
    async fn insert_dead_letter(&self, entry: NewDeadLetter) -> Result<(DlqEntry, bool), DlqError>;

    /// Atomically flips up to `limit` due pending entries to `sending` and
    /// returns them. Two overlapping sweeps can never claim the same entry
    /// because the flip and the selection are one statement.
    async fn claim_due_entries(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<DlqEntry>, DlqError>;

    /// Marks a replayed entry as resolved.
    async fn mark_resolved(&self, event_id: &str) -> Result<DlqEntry, DlqError>;

    /// Records a failed replay attempt: bumps the attempt counter, stores the
    /// error, and either schedules the next retry or, when `dead` is set,
    /// parks the entry permanently with no retry time.
    async fn mark_failed(
        &self,
        event_id: &str,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
        dead: bool,
    ) -> Result<DlqEntry, DlqError>;

    /// Operator action: puts a dead entry back in the queue with
    /// `attempts = 0`, due immediately. Refuses entries that are not dead.
    async fn retry_dead(&self, event_id: &str) -> Result<DlqEntry, DlqError>;

    async fn fetch_dead_letter(&self, event_id: &str) -> Result<Option<DlqEntry>, DlqError>;

    /// All entries, optionally narrowed to one status, most recent first.
    async fn list_dead_letters(&self, status: Option<DlqStatus>) -> Result<Vec<DlqEntry>, DlqError>;
}
