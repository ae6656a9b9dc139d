use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use pcg_common::Cents;
use serde::{Deserialize, Serialize};

use crate::db_types::{
    CommissionRecord,
    CommissionStatus,
    CommissionType,
    DisputeOutcome,
    DisputeRecord,
    DisputeStatus,
    Partner,
};

//--------------------------------------  MaturationReport   --------------------------------------

/// What a single maturation sweep did. `validated` holds commissions that
/// moved pending → validated, `released` those that moved
/// validated → available.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaturationReport {
    pub validated: Vec<CommissionRecord>,
    pub released: Vec<CommissionRecord>,
}

impl MaturationReport {
    pub fn is_empty(&self) -> bool {
        self.validated.is_empty() && self.released.is_empty()
    }

    pub fn total_validated(&self) -> Cents {
        self.validated.iter().map(|c| c.amount).sum()
    }

    pub fn total_released(&self) -> Cents {
        self.released.iter().map(|c| c.amount).sum()
    }
}

impl Display for MaturationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validated {} commissions ({}). Released {} commissions ({}).",
            self.validated.len(),
            self.total_validated(),
            self.released.len(),
            self.total_released()
        )
    }
}

//--------------------------------------    DisputeUpdate    --------------------------------------

/// An inbound dispute lifecycle notification, already shorn of processor
/// envelope noise. `closed` marks the processor's terminal notification; the
/// resulting outcome is derived from the status it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeUpdate {
    pub id: String,
    pub charge_id: String,
    pub amount: Cents,
    pub currency: String,
    pub reason: String,
    pub status: DisputeStatus,
    pub closed: bool,
}

impl DisputeUpdate {
    pub fn new<S1, S2, S3, S4>(id: S1, charge_id: S2, amount: Cents, currency: S3, reason: S4, status: DisputeStatus) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self {
            id: id.into(),
            charge_id: charge_id.into(),
            amount,
            currency: currency.into(),
            reason: reason.into(),
            status,
            closed: false,
        }
    }

    pub fn closing(mut self) -> Self {
        self.closed = true;
        self
    }
}

//--------------------------------------  DisputeTransition  --------------------------------------

/// What actually changed when a dispute event was recorded. Replays of an
/// already-applied event come back with all change flags off, which is how
/// callers avoid firing duplicate alerts.
#[derive(Debug, Clone, Serialize)]
pub struct DisputeTransition {
    pub dispute: DisputeRecord,
    pub created: bool,
    pub status_changed: bool,
    pub outcome_set: Option<DisputeOutcome>,
}

impl DisputeTransition {
    pub fn is_noop(&self) -> bool {
        !self.created && !self.status_changed && self.outcome_set.is_none()
    }
}

//--------------------------------------     DedupStatus     --------------------------------------

/// Result of registering a delivery attempt for an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStatus {
    /// First time this event id has been seen. Proceed.
    Fresh,
    /// Another invocation has registered the id but not completed it. The
    /// handlers are idempotent, so re-running them is the safe choice.
    InFlight,
    /// The event was fully handled on an earlier delivery.
    Completed,
}

impl Display for DedupStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::InFlight => write!(f, "in flight"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

//--------------------------------------    PartnerBalance   --------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerBalance {
    pub partner_id: String,
    pub pending: Cents,
    pub validated: Cents,
    pub available: Cents,
    pub total_earned: Cents,
}

impl From<&Partner> for PartnerBalance {
    fn from(partner: &Partner) -> Self {
        Self {
            partner_id: partner.id.clone(),
            pending: partner.pending_balance,
            validated: partner.validated_balance,
            available: partner.available_balance,
            total_earned: partner.total_earned,
        }
    }
}

//-------------------------------------- CommissionQueryFilter ------------------------------------

/// Search filter for commission listings. Every field is optional; an empty
/// filter matches everything for the scope it is used in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionQueryFilter {
    pub partner_id: Option<String>,
    pub commission_type: Option<CommissionType>,
    pub statuses: Vec<CommissionStatus>,
    pub source_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl CommissionQueryFilter {
    pub fn partner_id<S: Into<String>>(mut self, partner_id: S) -> Self {
        self.partner_id = Some(partner_id.into());
        self
    }

    pub fn commission_type(mut self, commission_type: CommissionType) -> Self {
        self.commission_type = Some(commission_type);
        self
    }

    pub fn status(mut self, status: CommissionStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn source_id<S: Into<String>>(mut self, source_id: S) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.partner_id.is_none()
            && self.commission_type.is_none()
            && self.statuses.is_empty()
            && self.source_id.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }
}
