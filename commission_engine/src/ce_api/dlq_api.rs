use std::{fmt::Debug, future::Future};

use chrono::{Duration, Utc};
use log::*;
use rand::Rng;

use crate::{
    db_types::{DlqEntry, DlqStatus, NewDeadLetter},
    events::{DeadLetterEvent, EventProducers},
    traits::{DlqError, DlqManagement},
};

/// Exponential backoff schedule for dead-letter replays.
///
/// The delay for attempt `n` is `base_delay * 2^n`, capped at `max_delay`. When jitter is on, up
/// to a fifth of the capped delay is added on top, which spreads out retries of entries that died
/// together without ever shortening a delay below its uncapped predecessor. Entries that fail
/// `max_attempts` times are parked as dead until an operator intervenes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: i64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { base_delay: Duration::seconds(60), max_delay: Duration::hours(6), max_attempts: 6, jitter: true }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: i64) -> Duration {
        // 2^31 seconds is over 60 years, so clamping the exponent never affects a real schedule.
        let factor = 1i64 << attempt.clamp(0, 30);
        let base = self.base_delay.num_seconds().max(1);
        let capped = base.saturating_mul(factor).min(self.max_delay.num_seconds());
        let jitter = if self.jitter && capped >= 5 { rand::thread_rng().gen_range(0..=capped / 5) } else { 0 };
        Duration::seconds(capped + jitter)
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub resolved: Vec<String>,
    pub retried: Vec<String>,
    pub dead: Vec<String>,
}

impl SweepReport {
    pub fn swept(&self) -> usize {
        self.resolved.len() + self.retried.len() + self.dead.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swept() == 0
    }
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Swept {} dead letters ({} resolved, {} rescheduled, {} dead)",
            self.swept(),
            self.resolved.len(),
            self.retried.len(),
            self.dead.len()
        )
    }
}

/// `DlqApi` manages the dead letter queue: parking failed webhook deliveries, replaying due
/// entries on the backoff schedule, and the manual recovery path for entries that exhausted their
/// retries.
pub struct DlqApi<B> {
    db: B,
    policy: RetryPolicy,
    producers: EventProducers,
}

impl<B> Debug for DlqApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DlqApi")
    }
}

impl<B> DlqApi<B> {
    pub fn new(db: B, policy: RetryPolicy, producers: EventProducers) -> Self {
        Self { db, policy, producers }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<B> DlqApi<B>
where B: DlqManagement
{
    /// Parks a failed delivery for later replay. The first retry is scheduled one base delay from
    /// now. If the event is already parked, the existing entry and its schedule are left alone.
    pub async fn enqueue(&self, event_id: &str, event_type: &str, payload: &str, error: &str) -> Result<(DlqEntry, bool), DlqError> {
        let next_retry_at = Utc::now() + self.policy.delay_for_attempt(0);
        let entry = NewDeadLetter::new(event_id, event_type, payload, error, next_retry_at);
        let (entry, inserted) = self.db.insert_dead_letter(entry).await?;
        if inserted {
            info!("📮️ Parked [{}] for replay at {}. Cause: {error}", entry.event_id, next_retry_at);
        }
        Ok((entry, inserted))
    }

    /// Replays every due entry through `dispatch`, which must push the payload through the exact
    /// same handler path as a live delivery. Entries that succeed are resolved. Entries that fail
    /// again are rescheduled with a longer delay, or parked as dead once their attempts are
    /// exhausted.
    ///
    /// Claiming flips each entry to `sending` first, so overlapping sweeps never replay the same
    /// entry twice.
    pub async fn sweep<F, Fut>(&self, limit: i64, dispatch: F) -> Result<SweepReport, DlqError>
    where
        F: Fn(DlqEntry) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let due = self.db.claim_due_entries(Utc::now(), limit).await?;
        let mut report = SweepReport::default();
        for entry in due {
            let event_id = entry.event_id.clone();
            match dispatch(entry.clone()).await {
                Ok(()) => {
                    self.db.mark_resolved(&event_id).await?;
                    report.resolved.push(event_id);
                },
                Err(error) => {
                    let attempts = entry.attempts + 1;
                    let dead = attempts >= self.policy.max_attempts;
                    let next_retry_at = (!dead).then(|| Utc::now() + self.policy.delay_for_attempt(attempts));
                    let updated = self.db.mark_failed(&event_id, &error, next_retry_at, dead).await?;
                    if dead {
                        self.call_dead_letter_hook(&updated).await;
                        report.dead.push(event_id);
                    } else {
                        report.retried.push(event_id);
                    }
                },
            }
        }
        Ok(report)
    }

    /// Manual operator recovery for a dead entry. Resets the attempt counter and makes the entry
    /// due immediately, so the next sweep picks it up.
    pub async fn retry_dead(&self, event_id: &str) -> Result<DlqEntry, DlqError> {
        self.db.retry_dead(event_id).await
    }

    pub async fn entry(&self, event_id: &str) -> Result<Option<DlqEntry>, DlqError> {
        self.db.fetch_dead_letter(event_id).await
    }

    pub async fn list(&self, status: Option<DlqStatus>) -> Result<Vec<DlqEntry>, DlqError> {
        self.db.list_dead_letters(status).await
    }

    async fn call_dead_letter_hook(&self, entry: &DlqEntry) {
        for emitter in &self.producers.dead_letter_producer {
            trace!("📮️ Notifying dead letter hook subscribers");
            emitter.publish_event(DeadLetterEvent::new(entry.clone())).await;
        }
    }
}
