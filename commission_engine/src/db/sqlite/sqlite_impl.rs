use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Duration, Utc};
use log::*;
use pcg_common::Cents;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

use crate::{
    db::sqlite::db::{commissions, disputes, dlq, events, new_pool, partners, recruitment},
    db_types::{
        CommissionRecord,
        CommissionStatus,
        CommissionType,
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
        WebhookEventStatus,
    },
    helpers::month_key,
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

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects using the URL in `PCG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = super::db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        if !Sqlite::database_exists(url).await? {
            info!("🗃️ Database {url} does not exist yet. Creating it");
            Sqlite::create_database(url).await?;
        }
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded migrations. Run at startup and in test setup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(de) if de.is_unique_violation())
}

//-------------------------------------- PartnerManagement   --------------------------------------

impl PartnerManagement for SqliteDatabase {
    async fn fetch_partner(&self, partner_id: &str) -> Result<Option<Partner>, PartnerApiError> {
        let mut conn = self.pool.acquire().await?;
        let partner = partners::fetch_partner(partner_id, &mut conn).await?;
        if partner.is_none() {
            debug!("🧑️ [{partner_id}] does not exist");
        }
        Ok(partner)
    }

    async fn fetch_balance(&self, partner_id: &str) -> Result<Option<PartnerBalance>, PartnerApiError> {
        let partner = self.fetch_partner(partner_id).await?;
        Ok(partner.as_ref().map(PartnerBalance::from))
    }

    async fn fetch_commissions(&self, filter: CommissionQueryFilter) -> Result<Vec<CommissionRecord>, PartnerApiError> {
        let mut conn = self.pool.acquire().await?;
        let records = commissions::search_commissions(filter, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_recruitment_link(&self, recruited_id: &str) -> Result<Option<RecruitmentLink>, PartnerApiError> {
        let mut conn = self.pool.acquire().await?;
        let link = recruitment::fetch_link_for_recruit(recruited_id, &mut conn).await?;
        Ok(link)
    }
}

//--------------------------------------  LedgerDatabase     --------------------------------------

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn register_partner(&self, partner: NewPartner) -> Result<(Partner, bool), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        partners::idempotent_insert(partner, &mut conn).await
    }

    async fn link_recruitment(&self, link: NewRecruitmentLink) -> Result<(RecruitmentLink, bool), LedgerError> {
        let mut tx = self.pool.begin().await?;
        // Only the recruiter must be a partner. The recruit can be another partner or an
        // external provider who never earns commissions themselves.
        if partners::fetch_partner(&link.recruiter_id, &mut tx).await?.is_none() {
            return Err(LedgerError::PartnerNotFound(link.recruiter_id));
        }
        let result = recruitment::idempotent_insert(link, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn credit_commission(&self, commission: NewCommission) -> Result<CreditOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        // Eligibility and duplicate checks happen inside the transaction so a
        // concurrent delivery of the same event cannot slip between them and
        // the insert.
        let Some(partner) = partners::fetch_partner(&commission.partner_id, &mut tx).await? else {
            debug!("🗃️ Refusing commission for unknown partner [{}]", commission.partner_id);
            return Ok(CreditOutcome::Ineligible(format!("partner {} does not exist", commission.partner_id)));
        };
        if !partner.is_active() {
            debug!("🗃️ Refusing commission for {partner}");
            return Ok(CreditOutcome::Ineligible(format!("partner {} is {}", partner.id, partner.status)));
        }
        if commission.amount.is_zero() {
            return Ok(CreditOutcome::Ineligible("zero-amount commissions are not recorded".to_string()));
        }
        if let Some(existing) =
            commissions::fetch_by_business_key(&commission.partner_id, &commission.source_id, commission.commission_type, &mut tx)
                .await?
        {
            debug!("🗃️ Duplicate delivery absorbed. {existing}");
            return Ok(CreditOutcome::AlreadyCredited(existing.id));
        }
        let record = match commissions::insert_commission(&commission, partner.role, CommissionStatus::Pending, &mut tx).await
        {
            Ok(record) => record,
            // A concurrent transaction inserted the same key after our check.
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                let existing = commissions::fetch_by_business_key(
                    &commission.partner_id,
                    &commission.source_id,
                    commission.commission_type,
                    &mut conn,
                )
                .await?
                .ok_or_else(|| LedgerError::DatabaseError("unique violation without a matching commission".to_string()))?;
                debug!("🗃️ Lost the insert race. Duplicate delivery absorbed. {existing}");
                return Ok(CreditOutcome::AlreadyCredited(existing.id));
            },
            Err(e) => return Err(e.into()),
        };
        let referrals = i64::from(matches!(commission.commission_type, CommissionType::ClientReferral));
        let recruits = i64::from(matches!(commission.commission_type, CommissionType::RecruitmentBonus));
        partners::adjust_balances(&partner.id, record.amount, Cents::from(0), Cents::from(0), record.amount, &mut tx)
            .await?;
        partners::incr_commission_stats(&partner.id, &month_key(Utc::now()), referrals, recruits, record.amount, &mut tx)
            .await?;
        tx.commit().await?;
        info!("🗃️💰️ {record}");
        Ok(CreditOutcome::Credited(record))
    }

    async fn evaluate_recruitment_threshold(
        &self,
        recruited_id: &str,
        threshold: Cents,
        bonus: Cents,
    ) -> Result<Option<CommissionRecord>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let Some(link) = recruitment::fetch_link_for_recruit(recruited_id, &mut tx).await? else {
            return Ok(None);
        };
        if link.commission_paid {
            return Ok(None);
        }
        if !link.window_open(Utc::now()) {
            debug!("🗃️ Recruitment window for [{recruited_id}] has lapsed. No bonus will be paid");
            return Ok(None);
        }
        let earned = commissions::sum_client_referrals(recruited_id, &mut tx).await?;
        if earned < threshold {
            trace!("🗃️ [{recruited_id}] has earned {earned} of the {threshold} recruitment threshold");
            return Ok(None);
        }
        let Some(recruiter) = partners::fetch_partner(&link.recruiter_id, &mut tx).await? else {
            warn!("🗃️ Recruiter [{}] of [{recruited_id}] no longer exists. No bonus will be paid", link.recruiter_id);
            return Ok(None);
        };
        if !recruiter.is_active() {
            info!("🗃️ Recruiter {recruiter} is not active. No bonus will be paid");
            return Ok(None);
        }
        let bonus_commission = NewCommission::new(&link.recruiter_id, CommissionType::RecruitmentBonus, bonus, recruited_id)
            .with_description(format!("Recruitment bonus for signing up {recruited_id}"));
        let record = match commissions::insert_commission(&bonus_commission, recruiter.role, CommissionStatus::Pending, &mut tx)
            .await
        {
            Ok(record) => record,
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                return Ok(None);
            },
            Err(e) => return Err(e.into()),
        };
        // The flag re-check. If another invocation flipped it after our read,
        // back out the bonus entirely.
        if !recruitment::mark_commission_paid(link.id, record.id, &mut tx).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        partners::adjust_balances(&recruiter.id, bonus, Cents::from(0), Cents::from(0), bonus, &mut tx).await?;
        partners::incr_commission_stats(&recruiter.id, &month_key(Utc::now()), 0, 1, bonus, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️🤝️ Recruitment threshold crossed. {bonus} paid to [{}] for [{recruited_id}]", recruiter.id);
        Ok(Some(record))
    }

    async fn cancel_commissions_for_source(&self, source_id: &str, reason: &str) -> Result<Vec<i64>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let candidates = commissions::fetch_cancellable_for_source(source_id, &mut tx).await?;
        let mut cancelled = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(updated) = commissions::cancel_commission(candidate.id, reason, &mut tx).await? else {
                continue;
            };
            // The bucket to reverse depends on the status before cancellation.
            let (pending, validated) = match candidate.status {
                CommissionStatus::Pending => (-candidate.amount, Cents::from(0)),
                CommissionStatus::Validated => (Cents::from(0), -candidate.amount),
                _ => (Cents::from(0), Cents::from(0)),
            };
            partners::adjust_balances(&candidate.partner_id, pending, validated, Cents::from(0), -candidate.amount, &mut tx)
                .await?;
            cancelled.push(updated.id);
        }
        tx.commit().await?;
        if !cancelled.is_empty() {
            info!("🗃️ Cancelled {} commissions for source [{source_id}]: {reason}", cancelled.len());
        }
        Ok(cancelled)
    }

    async fn mature_commissions(
        &self,
        validation_hold: Duration,
        release_delay: Duration,
    ) -> Result<MaturationReport, LedgerError> {
        let mut tx = self.pool.begin().await?;
        // Release before validate, so a commission can only advance one stage
        // per sweep.
        let released = commissions::release_validated(release_delay, &mut tx).await?;
        for commission in &released {
            partners::adjust_balances(
                &commission.partner_id,
                Cents::from(0),
                -commission.amount,
                commission.amount,
                Cents::from(0),
                &mut tx,
            )
            .await?;
        }
        let validated = commissions::validate_pending(validation_hold, &mut tx).await?;
        for commission in &validated {
            partners::adjust_balances(
                &commission.partner_id,
                -commission.amount,
                commission.amount,
                Cents::from(0),
                Cents::from(0),
                &mut tx,
            )
            .await?;
        }
        tx.commit().await?;
        let report = MaturationReport { validated, released };
        if !report.is_empty() {
            info!("🗃️ {report}");
        }
        Ok(report)
    }

    async fn manual_adjustment(
        &self,
        partner_id: &str,
        amount: Cents,
        description: &str,
        operator: &str,
    ) -> Result<CommissionRecord, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let Some(partner) = partners::fetch_partner(partner_id, &mut tx).await? else {
            return Err(LedgerError::PartnerNotFound(partner_id.to_string()));
        };
        let source_id = format!("manual-{}-{:08x}", operator, rand::random::<u32>());
        let adjustment = NewCommission::new(partner_id, CommissionType::ManualAdjustment, amount, source_id)
            .with_description(description);
        let record = commissions::insert_commission(&adjustment, partner.role, CommissionStatus::Available, &mut tx).await?;
        partners::adjust_balances(partner_id, Cents::from(0), Cents::from(0), amount, amount, &mut tx).await?;
        partners::incr_commission_stats(partner_id, &month_key(Utc::now()), 0, 0, amount, &mut tx).await?;
        tx.commit().await?;
        warn!("🗃️ Manual adjustment of {amount} applied to [{partner_id}] by {operator}");
        Ok(record)
    }
}

//-------------------------------------- DisputeManagement   --------------------------------------

impl DisputeManagement for SqliteDatabase {
    async fn record_dispute_event(&self, update: DisputeUpdate) -> Result<DisputeTransition, DisputeError> {
        let mut tx = self.pool.begin().await?;
        let existing = disputes::fetch_dispute(&update.id, &mut tx).await?;
        let (mut dispute, created, status_changed) = match existing {
            None => {
                let row = disputes::insert_dispute(&update, &mut tx).await?;
                disputes::append_history(&row.id, row.status, &mut tx).await?;
                (row, true, false)
            },
            Some(existing) => {
                // History only grows when the status actually moved, which is
                // what keeps replays from duplicating entries.
                if existing.status == update.status {
                    (existing, false, false)
                } else {
                    let row = disputes::update_status(&existing.id, update.status, &mut tx)
                        .await?
                        .ok_or_else(|| DisputeError::DisputeNotFound(existing.id.clone()))?;
                    disputes::append_history(&row.id, update.status, &mut tx).await?;
                    (row, false, true)
                }
            },
        };
        let mut outcome_set = None;
        if update.closed {
            let outcome = update.status.outcome_on_close();
            if disputes::set_outcome_once(&update.id, outcome, &mut tx).await? {
                dispute.outcome = Some(outcome);
                outcome_set = Some(outcome);
            }
        }
        tx.commit().await?;
        let transition = DisputeTransition { dispute, created, status_changed, outcome_set };
        if transition.is_noop() {
            debug!("⚖️ Replayed dispute event absorbed for [{}]", transition.dispute.id);
        } else {
            info!(
                "⚖️ {} (created: {created}, status changed: {status_changed}, outcome: {:?})",
                transition.dispute, transition.outcome_set
            );
        }
        Ok(transition)
    }

    async fn fetch_dispute(&self, dispute_id: &str) -> Result<Option<DisputeRecord>, DisputeError> {
        let mut conn = self.pool.acquire().await?;
        let dispute = disputes::fetch_dispute(dispute_id, &mut conn).await?;
        Ok(dispute)
    }

    async fn dispute_history(&self, dispute_id: &str) -> Result<Vec<DisputeStatusEntry>, DisputeError> {
        let mut conn = self.pool.acquire().await?;
        let history = disputes::history(dispute_id, &mut conn).await?;
        Ok(history)
    }
}

//--------------------------------------   DlqManagement     --------------------------------------

impl DlqManagement for SqliteDatabase {
    async fn insert_dead_letter(&self, entry: NewDeadLetter) -> Result<(DlqEntry, bool), DlqError> {
        let mut tx = self.pool.begin().await?;
        let result = dlq::idempotent_insert(entry, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn claim_due_entries(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<DlqEntry>, DlqError> {
        let mut conn = self.pool.acquire().await?;
        let claimed = dlq::claim_due(now, limit, &mut conn).await?;
        if !claimed.is_empty() {
            debug!("📮️ Claimed {} due dead letters", claimed.len());
        }
        Ok(claimed)
    }

    async fn mark_resolved(&self, event_id: &str) -> Result<DlqEntry, DlqError> {
        let mut conn = self.pool.acquire().await?;
        let entry = dlq::mark_resolved(event_id, &mut conn)
            .await?
            .ok_or_else(|| DlqError::EntryNotFound(event_id.to_string()))?;
        info!("📮️ {entry}");
        Ok(entry)
    }

    async fn mark_failed(
        &self,
        event_id: &str,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
        dead: bool,
    ) -> Result<DlqEntry, DlqError> {
        let mut conn = self.pool.acquire().await?;
        let entry = dlq::record_failure(event_id, error, next_retry_at, dead, &mut conn)
            .await?
            .ok_or_else(|| DlqError::EntryNotFound(event_id.to_string()))?;
        if dead {
            warn!("📮️ {entry} has exhausted its retries. Operator action required");
        }
        Ok(entry)
    }

    async fn retry_dead(&self, event_id: &str) -> Result<DlqEntry, DlqError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(entry) = dlq::reset_for_retry(event_id, &mut conn).await? {
            info!("📮️ Dead letter [{event_id}] manually requeued");
            return Ok(entry);
        }
        match dlq::fetch_entry(event_id, &mut conn).await? {
            Some(entry) => Err(DlqError::NotDead { event_id: event_id.to_string(), status: entry.status }),
            None => Err(DlqError::EntryNotFound(event_id.to_string())),
        }
    }

    async fn fetch_dead_letter(&self, event_id: &str) -> Result<Option<DlqEntry>, DlqError> {
        let mut conn = self.pool.acquire().await?;
        let entry = dlq::fetch_entry(event_id, &mut conn).await?;
        Ok(entry)
    }

    async fn list_dead_letters(&self, status: Option<DlqStatus>) -> Result<Vec<DlqEntry>, DlqError> {
        let mut conn = self.pool.acquire().await?;
        let entries = dlq::list_entries(status, &mut conn).await?;
        Ok(entries)
    }
}

//--------------------------------------     EventDedup      --------------------------------------

impl EventDedup for SqliteDatabase {
    async fn begin_event(&self, event_id: &str, event_type: &str) -> Result<DedupStatus, DedupError> {
        let mut conn = self.pool.acquire().await?;
        if events::try_insert_processing(event_id, event_type, &mut conn).await?.is_some() {
            return Ok(DedupStatus::Fresh);
        }
        match events::fetch_event(event_id, &mut conn).await? {
            Some(row) if row.status == WebhookEventStatus::Completed => Ok(DedupStatus::Completed),
            Some(_) => Ok(DedupStatus::InFlight),
            // Rows are never deleted, so this should be unreachable.
            None => Err(DedupError::DatabaseError(format!("event {event_id} vanished between insert and fetch"))),
        }
    }

    async fn complete_event(&self, event_id: &str) -> Result<(), DedupError> {
        let mut conn = self.pool.acquire().await?;
        if events::mark_completed(event_id, &mut conn).await? {
            Ok(())
        } else {
            Err(DedupError::EventNotFound(event_id.to_string()))
        }
    }
}
