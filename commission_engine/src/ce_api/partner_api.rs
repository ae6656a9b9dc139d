use std::fmt::Debug;

use crate::{
    db_types::{CommissionRecord, Partner, RecruitmentLink},
    traits::{CommissionQueryFilter, PartnerApiError, PartnerBalance, PartnerManagement},
};

/// Read-only view over partners, balances and commission histories. This is the surface the
/// dashboards and export jobs consume; nothing here mutates the ledger.
pub struct PartnerApi<B> {
    db: B,
}

impl<B: Debug> Debug for PartnerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PartnerApi ({:?})", self.db)
    }
}

impl<B> PartnerApi<B>
where B: PartnerManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn partner(&self, partner_id: &str) -> Result<Option<Partner>, PartnerApiError> {
        self.db.fetch_partner(partner_id).await
    }

    pub async fn balance(&self, partner_id: &str) -> Result<Option<PartnerBalance>, PartnerApiError> {
        self.db.fetch_balance(partner_id).await
    }

    pub async fn commissions(&self, filter: CommissionQueryFilter) -> Result<Vec<CommissionRecord>, PartnerApiError> {
        self.db.fetch_commissions(filter).await
    }

    pub async fn recruitment_link(&self, recruited_id: &str) -> Result<Option<RecruitmentLink>, PartnerApiError> {
        self.db.fetch_recruitment_link(recruited_id).await
    }
}
