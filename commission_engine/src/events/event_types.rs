use crate::{
    db_types::{CommissionRecord, DisputeOutcome, DisputeRecord, DlqEntry},
    traits::DisputeTransition,
};

/// Fired whenever a commission row is written to the ledger, whatever its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionCreditedEvent {
    pub commission: CommissionRecord,
}

impl CommissionCreditedEvent {
    pub fn new(commission: CommissionRecord) -> Self {
        Self { commission }
    }
}

/// Fired when a dispute is opened, changes status, or closes. Replayed deliveries that change
/// nothing do not fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeAlertEvent {
    pub dispute: DisputeRecord,
    pub created: bool,
    pub status_changed: bool,
    pub outcome_set: Option<DisputeOutcome>,
}

impl From<DisputeTransition> for DisputeAlertEvent {
    fn from(t: DisputeTransition) -> Self {
        Self { dispute: t.dispute, created: t.created, status_changed: t.status_changed, outcome_set: t.outcome_set }
    }
}

/// Fired when a webhook event exhausts its retries and is parked for operator attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterEvent {
    pub entry: DlqEntry,
}

impl DeadLetterEvent {
    pub fn new(entry: DlqEntry) -> Self {
        Self { entry }
    }
}

/// Fired when a recruitment bonus is withheld because the same payment already credited the
/// recruiter through the referral program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketingSuppressionEvent {
    pub source_id: String,
    pub partner_id: String,
    pub reason: String,
}
