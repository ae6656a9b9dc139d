use thiserror::Error;

use crate::{
    db_types::{CommissionRecord, Partner, RecruitmentLink},
    traits::data_objects::{CommissionQueryFilter, PartnerBalance},
};

#[derive(Debug, Clone, Error)]
pub enum PartnerApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Partner does not exist: {0}")]
    PartnerNotFound(String),
}

impl From<sqlx::Error> for PartnerApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Read-side access to partners and their ledgers. Used by the operator
/// routes and by the attribution flow to look up recruitment links.
#[allow(async_fn_in_trait)]
pub trait PartnerManagement {
    async fn fetch_partner(&self, partner_id: &str) -> Result<Option<Partner>, PartnerApiError>;

    async fn fetch_balance(&self, partner_id: &str) -> Result<Option<PartnerBalance>, PartnerApiError>;

    /// Commissions matching the filter, most recent first.
    async fn fetch_commissions(&self, filter: CommissionQueryFilter) -> Result<Vec<CommissionRecord>, PartnerApiError>;

    /// The recruitment link where `recruited_id` is the recruit, if any.
    async fn fetch_recruitment_link(&self, recruited_id: &str) -> Result<Option<RecruitmentLink>, PartnerApiError>;
}
