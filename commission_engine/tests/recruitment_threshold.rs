//! The recruiter's one-time bonus must fire exactly once, at the threshold crossing, and only
//! while the commission window is open.

use chrono::Duration;
use commission_engine::{
    db_types::{CommissionType, NewCommission, NewPartner, NewRecruitmentLink, PartnerRole, PartnerStatus},
    test_utils::{prepare_test_env, random_db_path},
    traits::{LedgerDatabase, PartnerManagement},
    SqliteDatabase,
};
use pcg_common::Cents;

fn threshold() -> Cents {
    Cents::from_dollars(50)
}

fn bonus() -> Cents {
    Cents::from_dollars(5)
}

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

async fn seed_pair(db: &SqliteDatabase, recruiter: &str, recruit: &str, window: Duration) {
    db.register_partner(NewPartner::new(recruiter, "Recruiter", PartnerRole::GroupAdmin)).await.unwrap();
    db.register_partner(NewPartner::new(recruit, "Recruit", PartnerRole::GroupAdmin)).await.unwrap();
    db.link_recruitment(NewRecruitmentLink::new(recruiter, recruit, window)).await.unwrap();
}

async fn credit_referral(db: &SqliteDatabase, partner: &str, source: &str) {
    let commission = NewCommission::new(partner, CommissionType::ClientReferral, Cents::from_dollars(10), source);
    assert!(db.credit_commission(commission).await.unwrap().is_credited());
}

#[tokio::test]
async fn bonus_fires_exactly_once_at_the_crossing() {
    let db = new_db().await;
    seed_pair(&db, "grp-A", "grp-B", Duration::days(180)).await;

    // $10 per referral, so the recruit crosses $50 on the fifth one.
    for n in 1..=4 {
        credit_referral(&db, "grp-B", &format!("call-{n}")).await;
        let outcome = db.evaluate_recruitment_threshold("grp-B", threshold(), bonus()).await.unwrap();
        assert!(outcome.is_none(), "bonus fired below the threshold, after {n} referrals");
    }
    credit_referral(&db, "grp-B", "call-5").await;
    let record = db.evaluate_recruitment_threshold("grp-B", threshold(), bonus()).await.unwrap();
    let record = record.expect("crossing the threshold must pay the recruiter");
    assert_eq!(record.partner_id, "grp-A");
    assert_eq!(record.amount, bonus());
    assert_eq!(record.commission_type, CommissionType::RecruitmentBonus);

    let link = db.fetch_recruitment_link("grp-B").await.unwrap().unwrap();
    assert!(link.commission_paid);
    assert_eq!(link.commission_id, Some(record.id));

    // Further referrals must never re-trigger it.
    credit_referral(&db, "grp-B", "call-6").await;
    assert!(db.evaluate_recruitment_threshold("grp-B", threshold(), bonus()).await.unwrap().is_none());

    let recruiter = db.fetch_partner("grp-A").await.unwrap().unwrap();
    assert_eq!(recruiter.pending_balance, bonus());
    assert_eq!(recruiter.total_recruits, 1);
}

#[tokio::test]
async fn concurrent_evaluations_pay_the_bonus_once() {
    let db = new_db().await;
    seed_pair(&db, "inf-A", "inf-B", Duration::days(180)).await;
    for n in 1..=5 {
        credit_referral(&db, "inf-B", &format!("call-{n}")).await;
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let db = db.clone();
        handles.push(tokio::spawn(async move { db.evaluate_recruitment_threshold("inf-B", threshold(), bonus()).await }));
    }
    let mut paid = 0;
    for handle in handles {
        if let Ok(Ok(Some(_))) = handle.await {
            paid += 1;
        }
    }
    assert!(paid <= 1, "the one-time bonus was paid {paid} times");

    let recruiter = db.fetch_partner("inf-A").await.unwrap().unwrap();
    assert_eq!(recruiter.pending_balance, bonus(), "exactly one bonus must land, no more, no fewer");
    assert!(db.fetch_recruitment_link("inf-B").await.unwrap().unwrap().commission_paid);
}

#[tokio::test]
async fn unlinked_partners_earn_nobody_a_bonus() {
    let db = new_db().await;
    db.register_partner(NewPartner::new("aff-solo", "Solo", PartnerRole::Affiliate)).await.unwrap();
    for n in 1..=5 {
        credit_referral(&db, "aff-solo", &format!("call-{n}")).await;
    }
    assert!(db.evaluate_recruitment_threshold("aff-solo", threshold(), bonus()).await.unwrap().is_none());
}

#[tokio::test]
async fn a_lapsed_window_pays_nothing() {
    let db = new_db().await;
    seed_pair(&db, "blg-A", "blg-B", Duration::days(-1)).await;
    for n in 1..=5 {
        credit_referral(&db, "blg-B", &format!("call-{n}")).await;
    }
    assert!(db.evaluate_recruitment_threshold("blg-B", threshold(), bonus()).await.unwrap().is_none());
    assert!(!db.fetch_recruitment_link("blg-B").await.unwrap().unwrap().commission_paid);
}

#[tokio::test]
async fn cancelled_referrals_do_not_count_toward_the_threshold() {
    let db = new_db().await;
    seed_pair(&db, "grp-C", "grp-D", Duration::days(180)).await;
    for n in 1..=5 {
        credit_referral(&db, "grp-D", &format!("call-{n}")).await;
    }
    // A refund pulls one referral back under the recruit, dropping the sum to $40.
    let cancelled = db.cancel_commissions_for_source("call-3", "charge refunded").await.unwrap();
    assert_eq!(cancelled.len(), 1);
    assert!(db.evaluate_recruitment_threshold("grp-D", threshold(), bonus()).await.unwrap().is_none());

    credit_referral(&db, "grp-D", "call-6").await;
    assert!(db.evaluate_recruitment_threshold("grp-D", threshold(), bonus()).await.unwrap().is_some());
}

#[tokio::test]
async fn a_suspended_recruiter_is_not_paid() {
    let db = new_db().await;
    db.register_partner(NewPartner::new("aff-A", "Recruiter", PartnerRole::Affiliate).with_status(PartnerStatus::Suspended))
        .await
        .unwrap();
    db.register_partner(NewPartner::new("aff-B", "Recruit", PartnerRole::Affiliate)).await.unwrap();
    db.link_recruitment(NewRecruitmentLink::new("aff-A", "aff-B", Duration::days(180))).await.unwrap();
    for n in 1..=5 {
        credit_referral(&db, "aff-B", &format!("call-{n}")).await;
    }
    assert!(db.evaluate_recruitment_threshold("aff-B", threshold(), bonus()).await.unwrap().is_none());
    // The flag stays down, so the bonus is still owed if the recruiter is reinstated.
    assert!(!db.fetch_recruitment_link("aff-B").await.unwrap().unwrap().commission_paid);
}

#[tokio::test]
async fn linking_the_same_recruit_twice_is_a_noop() {
    let db = new_db().await;
    db.register_partner(NewPartner::new("grp-X", "First", PartnerRole::GroupAdmin)).await.unwrap();
    db.register_partner(NewPartner::new("grp-Y", "Second", PartnerRole::GroupAdmin)).await.unwrap();
    let (link, created) =
        db.link_recruitment(NewRecruitmentLink::new("grp-X", "prov-77", Duration::days(180))).await.unwrap();
    assert!(created);
    // A second partner claiming the same recruit keeps the original attribution.
    let (again, created) =
        db.link_recruitment(NewRecruitmentLink::new("grp-Y", "prov-77", Duration::days(180))).await.unwrap();
    assert!(!created);
    assert_eq!(again.id, link.id);
    assert_eq!(again.recruiter_id, "grp-X");
}
