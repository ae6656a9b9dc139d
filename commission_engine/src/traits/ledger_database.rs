use chrono::Duration;
use pcg_common::Cents;
use thiserror::Error;

use crate::{
    db_types::{CommissionRecord, CreditOutcome, NewCommission, NewPartner, NewRecruitmentLink, Partner, RecruitmentLink},
    traits::{data_objects::MaturationReport, PartnerApiError, PartnerManagement},
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Partner does not exist: {0}")]
    PartnerNotFound(String),
    #[error("Partner error: {0}")]
    PartnerError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<PartnerApiError> for LedgerError {
    fn from(e: PartnerApiError) -> Self {
        Self::PartnerError(e.to_string())
    }
}

/// The mutating half of the commission ledger.
///
/// Every method that writes money is a single atomic transaction. Eligibility
/// and duplicate checks are re-done inside the transaction boundary, never in
/// a separate read beforehand, because two deliveries of the same event can
/// execute these methods concurrently.
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: PartnerManagement {
    /// The connection URL for the database.
    fn url(&self) -> &str;

    /// Creates the partner if the id is new, returning the row and whether it
    /// was inserted.
    async fn register_partner(&self, partner: NewPartner) -> Result<(Partner, bool), LedgerError>;

    /// Records that `recruiter` signed up `recruited`. Idempotent on the
    /// recruited partner id; a partner can only be recruited once.
    async fn link_recruitment(&self, link: NewRecruitmentLink) -> Result<(RecruitmentLink, bool), LedgerError>;

    /// Credits a commission and bumps the partner's pending balance and stats
    /// in one transaction.
    ///
    /// Inside the transaction it re-reads the partner (must exist and be
    /// active) and re-checks the `(partner, source, type)` key. A duplicate
    /// key is a success no-op (`AlreadyCredited`), since the caller may be a
    /// replay of an event that was already paid.
    async fn credit_commission(&self, commission: NewCommission) -> Result<CreditOutcome, LedgerError>;

    /// Pays the one-time recruiter bonus if `recruited_id`'s cumulative
    /// non-cancelled client-referral earnings have crossed `threshold`.
    ///
    /// Returns the bonus commission when it fired, `None` when there is no
    /// link, the window lapsed, the bonus was already paid, the recruiter is
    /// not active, or the sum is still below the threshold. The
    /// `commission_paid` flag is re-read and flipped inside the same
    /// transaction that writes the bonus, so concurrent evaluations cannot
    /// both pay.
    async fn evaluate_recruitment_threshold(
        &self,
        recruited_id: &str,
        threshold: Cents,
        bonus: Cents,
    ) -> Result<Option<CommissionRecord>, LedgerError>;

    /// Cancels every pending or validated commission attributed to
    /// `source_id`, pulling the amounts back out of the matching balance
    /// buckets. Available commissions are left alone. Returns the cancelled
    /// commission ids.
    async fn cancel_commissions_for_source(&self, source_id: &str, reason: &str) -> Result<Vec<i64>, LedgerError>;

    /// Moves commissions along the maturation pipeline using the database
    /// clock: validated → available once `release_delay` has passed since
    /// validation, then pending → validated once `validation_hold` has passed
    /// since creation. Release runs first so a commission never jumps two
    /// stages in one sweep.
    async fn mature_commissions(&self, validation_hold: Duration, release_delay: Duration)
        -> Result<MaturationReport, LedgerError>;

    /// Writes an operator-initiated adjustment, immediately available.
    /// Negative amounts are legal and debit the partner.
    async fn manual_adjustment(
        &self,
        partner_id: &str,
        amount: Cents,
        description: &str,
        operator: &str,
    ) -> Result<CommissionRecord, LedgerError>;
}
