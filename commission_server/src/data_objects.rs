use std::fmt::Display;

use chrono::{DateTime, Utc};
use commission_engine::{
    db_types::{CommissionStatus, CommissionType, DisputeRecord, DisputeStatusEntry, DlqStatus, PartnerRole, PartnerStatus},
    traits::CommissionQueryFilter,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Query parameters for `GET /api/dlq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqListParams {
    pub status: Option<DlqStatus>,
}

/// Query parameters for `GET /api/partners/{id}/commissions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionListParams {
    #[serde(rename = "type")]
    pub commission_type: Option<CommissionType>,
    pub status: Option<CommissionStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl CommissionListParams {
    pub fn into_filter(self, partner_id: &str) -> CommissionQueryFilter {
        let mut filter = CommissionQueryFilter::default().partner_id(partner_id);
        if let Some(t) = self.commission_type {
            filter = filter.commission_type(t);
        }
        if let Some(s) = self.status {
            filter = filter.status(s);
        }
        if let Some(since) = self.since {
            filter = filter.since(since);
        }
        if let Some(until) = self.until {
            filter = filter.until(until);
        }
        filter
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartnerRequest {
    pub id: String,
    pub name: String,
    pub role: PartnerRole,
    #[serde(default)]
    pub status: PartnerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecruitmentRequest {
    pub recruited_id: String,
}

/// Operator-initiated balance correction. `amount` is in cents and may be negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub amount: i64,
    pub description: String,
    pub operator: String,
}

/// A dispute together with its append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeView {
    pub dispute: DisputeRecord,
    pub history: Vec<DisputeStatusEntry>,
}
