use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{CommissionRecord, CreditOutcome};

/// Everything the ledger needs to know about a settled payment in order to pay the right people.
///
/// `source_id` is the call session or payment identifier and doubles as the idempotency key, so
/// replays of the same payment collapse into no-ops. The referrer is the partner whose link
/// brought the paying client in. The provider is the professional who took the call, used to look
/// up whether a partner recruited them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttribution {
    pub source_id: String,
    pub referrer_id: Option<String>,
    pub provider_id: Option<String>,
}

impl PaymentAttribution {
    pub fn new<S: Into<String>>(source_id: S) -> Self {
        Self { source_id: source_id.into(), referrer_id: None, provider_id: None }
    }

    pub fn with_referrer<S: Into<String>>(mut self, partner_id: S) -> Self {
        self.referrer_id = Some(partner_id.into());
        self
    }

    pub fn with_provider<S: Into<String>>(mut self, provider_id: S) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    /// True when the payment carries no attribution at all and the ledger has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.referrer_id.is_none() && self.provider_id.is_none()
    }
}

impl Display for PaymentAttribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let referrer = self.referrer_id.as_deref().unwrap_or("none");
        let provider = self.provider_id.as_deref().unwrap_or("none");
        write!(f, "Attribution for [{}] (referrer: {referrer}, provider: {provider})", self.source_id)
    }
}

/// What actually happened when an attribution was processed.
#[derive(Debug, Clone, Default)]
pub struct AttributionReport {
    /// Outcome of the client-referral path, if a referrer was attributed.
    pub referral: Option<CreditOutcome>,
    /// Outcome of the network-bonus path, if the provider was recruited by a partner.
    pub network: Option<CreditOutcome>,
    /// The one-time recruiter bonus, when this payment pushed the referrer over the threshold.
    pub recruitment: Option<CommissionRecord>,
    /// Set when the network bonus was withheld because the referrer also recruited the provider.
    pub suppressed_recruiter: Option<String>,
}

impl AttributionReport {
    /// Number of commission rows this attribution wrote.
    pub fn credited_count(&self) -> usize {
        let mut count = 0;
        if self.referral.as_ref().is_some_and(CreditOutcome::is_credited) {
            count += 1;
        }
        if self.network.as_ref().is_some_and(CreditOutcome::is_credited) {
            count += 1;
        }
        if self.recruitment.is_some() {
            count += 1;
        }
        count
    }
}

impl Display for AttributionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} commissions credited", self.credited_count())?;
        if let Some(outcome) = &self.referral {
            write!(f, ". Referral: {outcome}")?;
        }
        if let Some(outcome) = &self.network {
            write!(f, ". Network: {outcome}")?;
        }
        if let Some(bonus) = &self.recruitment {
            write!(f, ". Recruitment bonus: {bonus}")?;
        }
        if let Some(partner) = &self.suppressed_recruiter {
            write!(f, ". Network bonus for [{partner}] suppressed")?;
        }
        Ok(())
    }
}
