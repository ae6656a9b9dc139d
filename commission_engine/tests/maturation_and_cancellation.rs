//! The maturation pipeline (pending → validated → available) and refund clawbacks against it.

use chrono::Duration;
use commission_engine::{
    db_types::{CommissionRecord, CommissionStatus, CommissionType, NewCommission, NewPartner, PartnerRole},
    test_utils::{prepare_test_env, random_db_path},
    traits::{CommissionQueryFilter, LedgerDatabase, PartnerManagement},
    SqliteDatabase,
};
use pcg_common::Cents;

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

async fn credit(db: &SqliteDatabase, partner: &str, source: &str) {
    let commission = NewCommission::new(partner, CommissionType::ClientReferral, Cents::from_dollars(10), source);
    assert!(db.credit_commission(commission).await.unwrap().is_credited());
}

async fn commission_for(db: &SqliteDatabase, source: &str) -> CommissionRecord {
    let mut rows = db.fetch_commissions(CommissionQueryFilter::default().source_id(source)).await.unwrap();
    assert_eq!(rows.len(), 1, "expected exactly one commission for {source}");
    rows.remove(0)
}

#[tokio::test]
async fn commissions_mature_one_stage_per_sweep() {
    let db = new_db().await;
    db.register_partner(NewPartner::new("inf-1", "Vera", PartnerRole::Influencer)).await.unwrap();
    credit(&db, "inf-1", "call-1").await;

    // Zero holds make the commission overdue immediately, but release only
    // considers rows that were already validated when the sweep started.
    let first = db.mature_commissions(Duration::zero(), Duration::zero()).await.unwrap();
    assert_eq!(first.validated.len(), 1);
    assert!(first.released.is_empty());
    assert_eq!(first.total_validated(), Cents::from_dollars(10));
    let row = commission_for(&db, "call-1").await;
    assert_eq!(row.status, CommissionStatus::Validated);
    assert!(row.validated_at.is_some());
    assert!(row.available_at.is_none());

    let partner = db.fetch_partner("inf-1").await.unwrap().unwrap();
    assert!(partner.pending_balance.is_zero());
    assert_eq!(partner.validated_balance, Cents::from_dollars(10));

    let second = db.mature_commissions(Duration::zero(), Duration::zero()).await.unwrap();
    assert!(second.validated.is_empty());
    assert_eq!(second.released.len(), 1);
    let row = commission_for(&db, "call-1").await;
    assert_eq!(row.status, CommissionStatus::Available);
    assert!(row.available_at.is_some());

    let partner = db.fetch_partner("inf-1").await.unwrap().unwrap();
    assert!(partner.validated_balance.is_zero());
    assert_eq!(partner.available_balance, Cents::from_dollars(10));
    assert_eq!(partner.total_earned, Cents::from_dollars(10));
}

#[tokio::test]
async fn fresh_commissions_stay_put_under_real_holds() {
    let db = new_db().await;
    db.register_partner(NewPartner::new("blg-2", "Omar", PartnerRole::Blogger)).await.unwrap();
    credit(&db, "blg-2", "call-2").await;

    let report = db.mature_commissions(Duration::days(7), Duration::hours(24)).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(commission_for(&db, "call-2").await.status, CommissionStatus::Pending);
    let partner = db.fetch_partner("blg-2").await.unwrap().unwrap();
    assert_eq!(partner.pending_balance, Cents::from_dollars(10));
    assert!(partner.validated_balance.is_zero());
}

#[tokio::test]
async fn refunds_claw_back_pending_and_validated_buckets() {
    let db = new_db().await;
    db.register_partner(NewPartner::new("grp-1", "Dana", PartnerRole::GroupAdmin)).await.unwrap();
    credit(&db, "grp-1", "call-1").await;
    credit(&db, "grp-1", "call-2").await;
    // A long release delay validates both without releasing anything.
    let report = db.mature_commissions(Duration::zero(), Duration::days(1)).await.unwrap();
    assert_eq!(report.validated.len(), 2);
    assert!(report.released.is_empty());
    credit(&db, "grp-1", "call-3").await;

    // call-1 is validated by now, so the refund debits the validated bucket.
    let cancelled = db.cancel_commissions_for_source("call-1", "charge refunded").await.unwrap();
    assert_eq!(cancelled.len(), 1);
    let row = commission_for(&db, "call-1").await;
    assert_eq!(row.status, CommissionStatus::Cancelled);
    assert!(row.cancelled_at.is_some());
    assert_eq!(row.cancellation_reason.as_deref(), Some("charge refunded"));

    let partner = db.fetch_partner("grp-1").await.unwrap().unwrap();
    assert_eq!(partner.validated_balance, Cents::from_dollars(10));
    assert_eq!(partner.pending_balance, Cents::from_dollars(10));
    assert_eq!(partner.total_earned, Cents::from_dollars(20));

    // call-3 never matured, so this refund debits the pending bucket.
    let cancelled = db.cancel_commissions_for_source("call-3", "charge refunded").await.unwrap();
    assert_eq!(cancelled.len(), 1);
    let partner = db.fetch_partner("grp-1").await.unwrap().unwrap();
    assert!(partner.pending_balance.is_zero());
    assert_eq!(partner.validated_balance, Cents::from_dollars(10));
    assert_eq!(partner.total_earned, Cents::from_dollars(10));

    // The untouched source keeps its commission.
    assert_eq!(commission_for(&db, "call-2").await.status, CommissionStatus::Validated);
}

#[tokio::test]
async fn available_commissions_are_not_clawed_back() {
    let db = new_db().await;
    db.register_partner(NewPartner::new("aff-1", "Iris", PartnerRole::Affiliate)).await.unwrap();
    credit(&db, "aff-1", "call-4").await;
    db.mature_commissions(Duration::zero(), Duration::zero()).await.unwrap();
    db.mature_commissions(Duration::zero(), Duration::zero()).await.unwrap();
    assert_eq!(commission_for(&db, "call-4").await.status, CommissionStatus::Available);

    let cancelled = db.cancel_commissions_for_source("call-4", "charge refunded").await.unwrap();
    assert!(cancelled.is_empty(), "payout-eligible money must not be pulled back");
    assert_eq!(commission_for(&db, "call-4").await.status, CommissionStatus::Available);
    let partner = db.fetch_partner("aff-1").await.unwrap().unwrap();
    assert_eq!(partner.available_balance, Cents::from_dollars(10));
    assert_eq!(partner.total_earned, Cents::from_dollars(10));
}

#[tokio::test]
async fn one_refund_cancels_every_commission_on_the_charge() {
    let db = new_db().await;
    db.register_partner(NewPartner::new("inf-9", "Referrer", PartnerRole::Influencer)).await.unwrap();
    db.register_partner(NewPartner::new("grp-9", "Recruiter", PartnerRole::GroupAdmin)).await.unwrap();
    // The same charge paid a referral to one partner and a network bonus to another.
    credit(&db, "inf-9", "call-9").await;
    let network = NewCommission::new("grp-9", CommissionType::NetworkBonus, Cents::from_dollars(5), "call-9");
    assert!(db.credit_commission(network).await.unwrap().is_credited());

    let cancelled = db.cancel_commissions_for_source("call-9", "charge refunded").await.unwrap();
    assert_eq!(cancelled.len(), 2);
    for partner_id in ["inf-9", "grp-9"] {
        let partner = db.fetch_partner(partner_id).await.unwrap().unwrap();
        assert!(partner.pending_balance.is_zero(), "{partner_id} kept a cancelled commission");
        assert!(partner.total_earned.is_zero());
    }
}

#[tokio::test]
async fn cancelling_an_unknown_source_is_harmless() {
    let db = new_db().await;
    let cancelled = db.cancel_commissions_for_source("call-404", "charge refunded").await.unwrap();
    assert!(cancelled.is_empty());
}
