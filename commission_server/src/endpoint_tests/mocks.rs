use chrono::{DateTime, Duration, Utc};
use commission_engine::{
    db_types::{
        CommissionRecord,
        CreditOutcome,
        DisputeRecord,
        DisputeStatusEntry,
        DlqEntry,
        DlqStatus,
        NewCommission,
        NewDeadLetter,
        NewPartner,
        NewRecruitmentLink,
        Partner,
        RecruitmentLink,
    },
    traits::{
        CommissionQueryFilter,
        DedupError,
        DedupStatus,
        DisputeError,
        DisputeManagement,
        DisputeTransition,
        DisputeUpdate,
        DlqError,
        DlqManagement,
        EventDedup,
        LedgerDatabase,
        LedgerError,
        MaturationReport,
        PartnerApiError,
        PartnerBalance,
        PartnerManagement,
    },
};
use mockall::mock;
use pcg_common::Cents;

mock! {
    pub CommissionDb {}

    impl PartnerManagement for CommissionDb {
        async fn fetch_partner(&self, partner_id: &str) -> Result<Option<Partner>, PartnerApiError>;
        async fn fetch_balance(&self, partner_id: &str) -> Result<Option<PartnerBalance>, PartnerApiError>;
        async fn fetch_commissions(&self, filter: CommissionQueryFilter) -> Result<Vec<CommissionRecord>, PartnerApiError>;
        async fn fetch_recruitment_link(&self, recruited_id: &str) -> Result<Option<RecruitmentLink>, PartnerApiError>;
    }

    impl LedgerDatabase for CommissionDb {
        fn url(&self) -> &str;
        async fn register_partner(&self, partner: NewPartner) -> Result<(Partner, bool), LedgerError>;
        async fn link_recruitment(&self, link: NewRecruitmentLink) -> Result<(RecruitmentLink, bool), LedgerError>;
        async fn credit_commission(&self, commission: NewCommission) -> Result<CreditOutcome, LedgerError>;
        async fn evaluate_recruitment_threshold(&self, recruited_id: &str, threshold: Cents, bonus: Cents) -> Result<Option<CommissionRecord>, LedgerError>;
        async fn cancel_commissions_for_source(&self, source_id: &str, reason: &str) -> Result<Vec<i64>, LedgerError>;
        async fn mature_commissions(&self, validation_hold: Duration, release_delay: Duration) -> Result<MaturationReport, LedgerError>;
        async fn manual_adjustment(&self, partner_id: &str, amount: Cents, description: &str, operator: &str) -> Result<CommissionRecord, LedgerError>;
    }

    impl DisputeManagement for CommissionDb {
        async fn record_dispute_event(&self, update: DisputeUpdate) -> Result<DisputeTransition, DisputeError>;
        async fn fetch_dispute(&self, dispute_id: &str) -> Result<Option<DisputeRecord>, DisputeError>;
        async fn dispute_history(&self, dispute_id: &str) -> Result<Vec<DisputeStatusEntry>, DisputeError>;
    }

    impl DlqManagement for CommissionDb {
        async fn insert_dead_letter(&self, entry: NewDeadLetter) -> Result<(DlqEntry, bool), DlqError>;
        async fn claim_due_entries(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<DlqEntry>, DlqError>;
        async fn mark_resolved(&self, event_id: &str) -> Result<DlqEntry, DlqError>;
        async fn mark_failed(&self, event_id: &str, error: &str, next_retry_at: Option<DateTime<Utc>>, dead: bool) -> Result<DlqEntry, DlqError>;
        async fn retry_dead(&self, event_id: &str) -> Result<DlqEntry, DlqError>;
        async fn fetch_dead_letter(&self, event_id: &str) -> Result<Option<DlqEntry>, DlqError>;
        async fn list_dead_letters(&self, status: Option<DlqStatus>) -> Result<Vec<DlqEntry>, DlqError>;
    }

    impl EventDedup for CommissionDb {
        async fn begin_event(&self, event_id: &str, event_type: &str) -> Result<DedupStatus, DedupError>;
        async fn complete_event(&self, event_id: &str) -> Result<(), DedupError>;
    }
}
