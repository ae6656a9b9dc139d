use std::fmt::Debug;

use chrono::Utc;
use log::*;
use pcg_common::Cents;

use crate::{
    ce_api::{
        attribution_objects::{AttributionReport, PaymentAttribution},
        settings::CommissionSettings,
    },
    db_types::{CommissionRecord, CommissionType, CreditOutcome, NewCommission, NewPartner, NewRecruitmentLink, Partner, RecruitmentLink},
    events::{CommissionCreditedEvent, EventProducers, MarketingSuppressionEvent},
    traits::{LedgerDatabase, LedgerError, MaturationReport},
};

/// `LedgerApi` is the primary write API for the commission ledger. It turns payment attributions
/// into commission records, reverses them when payments come back as refunds or disputes, and
/// walks records through the maturation lifecycle.
pub struct LedgerApi<B> {
    db: B,
    settings: CommissionSettings,
    producers: EventProducers,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B, settings: CommissionSettings, producers: EventProducers) -> Self {
        Self { db, settings, producers }
    }

    pub fn settings(&self) -> &CommissionSettings {
        &self.settings
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> LedgerApi<B>
where B: LedgerDatabase
{
    /// Pays out everything a settled payment owes.
    ///
    /// The referral path runs first: the referring partner is credited a fixed client-referral
    /// commission, and since their referral earnings just grew, the recruitment threshold is
    /// evaluated on their behalf. The network path runs second: if a partner recruited the
    /// provider who took the call, that partner earns a network bonus, unless they are the same
    /// partner the referral path just paid. In that case the bonus is withheld and a suppression
    /// notice goes out instead, so one payment never pays the same partner through two programmes.
    ///
    /// Every step is idempotent. Replaying the same attribution produces `AlreadyCredited`
    /// outcomes and no new rows, which is what makes this safe to call from both live webhook
    /// deliveries and dead-letter replays, even concurrently.
    pub async fn process_payment_attribution(&self, attribution: PaymentAttribution) -> Result<AttributionReport, LedgerError> {
        let mut report = AttributionReport::default();
        if attribution.is_empty() {
            debug!("💰️ {attribution}. Nothing to credit");
            return Ok(report);
        }
        let mut credited_referrer = None;
        if let Some(referrer_id) = &attribution.referrer_id {
            let commission = NewCommission::new(
                referrer_id,
                CommissionType::ClientReferral,
                self.settings.client_referral_amount,
                &attribution.source_id,
            );
            let outcome = self.db.credit_commission(commission).await?;
            if let CreditOutcome::Credited(record) = &outcome {
                self.call_commission_credited_hook(record).await;
            }
            if outcome.is_attributed() {
                credited_referrer = Some(referrer_id.clone());
                // The referrer's referral sum grew (or a crashed earlier attempt already grew
                // it), so this is the moment their recruiter's one-time bonus can fall due.
                let bonus = self
                    .db
                    .evaluate_recruitment_threshold(
                        referrer_id,
                        self.settings.recruitment_threshold,
                        self.settings.recruitment_bonus_amount,
                    )
                    .await?;
                if let Some(record) = &bonus {
                    self.call_commission_credited_hook(record).await;
                }
                report.recruitment = bonus;
            }
            report.referral = Some(outcome);
        }
        if let Some(provider_id) = &attribution.provider_id {
            self.attribute_provider_call(provider_id, &attribution.source_id, credited_referrer.as_deref(), &mut report)
                .await?;
        }
        debug!("💰️ {attribution} processed. {report}");
        Ok(report)
    }

    async fn attribute_provider_call(
        &self,
        provider_id: &str,
        source_id: &str,
        credited_referrer: Option<&str>,
        report: &mut AttributionReport,
    ) -> Result<(), LedgerError> {
        let Some(link) = self.db.fetch_recruitment_link(provider_id).await? else {
            trace!("💰️ Provider [{provider_id}] was not recruited by anyone. No network bonus due");
            return Ok(());
        };
        // Anti-double-payment rule. A partner who both referred the client and recruited the
        // provider gets paid once for this payment, through the referral programme.
        if credited_referrer.is_some_and(|referrer| referrer == link.recruiter_id) {
            info!(
                "💰️ Network bonus for [{}] on [{source_id}] withheld. They were already credited as the referrer",
                link.recruiter_id
            );
            report.suppressed_recruiter = Some(link.recruiter_id.clone());
            self.call_marketing_suppression_hook(source_id, &link.recruiter_id).await;
            return Ok(());
        }
        if !link.window_open(Utc::now()) {
            debug!("💰️ Recruitment window for provider [{provider_id}] has lapsed. No network bonus due");
            return Ok(());
        }
        let commission =
            NewCommission::new(&link.recruiter_id, CommissionType::NetworkBonus, self.settings.network_bonus_amount, source_id)
                .with_description(format!("Network bonus for a call taken by {provider_id}"));
        let outcome = self.db.credit_commission(commission).await?;
        if let CreditOutcome::Credited(record) = &outcome {
            self.call_commission_credited_hook(record).await;
        }
        report.network = Some(outcome);
        Ok(())
    }

    /// Cancels every cancellable commission that originated from `source_id`. Used when a payment
    /// is refunded or disputed. Returns the ids of the commissions that were cancelled.
    pub async fn cancel_source(&self, source_id: &str, reason: &str) -> Result<Vec<i64>, LedgerError> {
        self.db.cancel_commissions_for_source(source_id, reason).await
    }

    /// Runs one maturation sweep: validated commissions past the release delay become available,
    /// then pending commissions past the hold period become validated.
    pub async fn mature(&self) -> Result<MaturationReport, LedgerError> {
        self.db.mature_commissions(self.settings.validation_hold, self.settings.release_delay).await
    }

    /// Credits or debits a partner outside the usual flows. The record lands directly in the
    /// available bucket and is stamped with the operator who asked for it.
    pub async fn manual_adjustment(
        &self,
        partner_id: &str,
        amount: Cents,
        description: &str,
        operator: &str,
    ) -> Result<CommissionRecord, LedgerError> {
        let record = self.db.manual_adjustment(partner_id, amount, description, operator).await?;
        self.call_commission_credited_hook(&record).await;
        Ok(record)
    }

    pub async fn register_partner(&self, partner: NewPartner) -> Result<(Partner, bool), LedgerError> {
        self.db.register_partner(partner).await
    }

    /// Records that `recruiter` signed up `recruited`, opening the configured commission window.
    pub async fn link_recruitment(&self, recruiter_id: &str, recruited_id: &str) -> Result<(RecruitmentLink, bool), LedgerError> {
        let link = NewRecruitmentLink::new(recruiter_id, recruited_id, self.settings.commission_window);
        self.db.link_recruitment(link).await
    }

    async fn call_commission_credited_hook(&self, record: &CommissionRecord) {
        for emitter in &self.producers.commission_credited_producer {
            trace!("💰️ Notifying commission credited hook subscribers");
            let event = CommissionCreditedEvent::new(record.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_marketing_suppression_hook(&self, source_id: &str, partner_id: &str) {
        for emitter in &self.producers.marketing_suppression_producer {
            let event = MarketingSuppressionEvent {
                source_id: source_id.to_string(),
                partner_id: partner_id.to_string(),
                reason: "referrer and recruiter coincide".to_string(),
            };
            emitter.publish_event(event).await;
        }
    }
}
