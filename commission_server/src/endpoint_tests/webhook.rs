use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use commission_engine::{
    db_types::{
        CommissionRecord,
        CommissionStatus,
        CommissionType,
        CreditOutcome,
        DisputeRecord,
        DlqEntry,
        DlqStatus,
        NewCommission,
        NewDeadLetter,
        PartnerRole,
    },
    events::EventProducers,
    traits::{DedupStatus, DisputeTransition, DisputeUpdate, LedgerError},
    CommissionSettings,
    DisputeApi,
    DlqApi,
    LedgerApi,
    RetryPolicy,
};

use super::{
    helpers::{post_webhook, sign_payload, test_stripe_config, TEST_WEBHOOK_SECRET},
    mocks::MockCommissionDb,
};
use crate::{middleware::SignatureMiddlewareFactory, router::EventRouter, webhook_routes::StripeWebhookRoute};

const PAYMENT_EVENT: &str = include_str!("../test_assets/payment_intent_succeeded.json");
const DISPUTE_EVENT: &str = include_str!("../test_assets/charge_dispute_created.json");

#[actix_web::test]
async fn requests_without_a_valid_signature_are_rejected() {
    let _ = env_logger::try_init().ok();
    let header = sign_payload("whsec_someone_elses_secret", PAYMENT_EVENT);
    let err = post_webhook(&header, PAYMENT_EVENT, configure_untouched).await.expect_err("Expected a rejection");
    assert_eq!(err, "Invalid webhook signature.");
    let err = post_webhook("", PAYMENT_EVENT, configure_untouched).await.expect_err("Expected a rejection");
    assert_eq!(err, "Missing signature header.");
}

#[actix_web::test]
async fn garbage_payloads_are_rejected() {
    let _ = env_logger::try_init().ok();
    let body = "this is not an event envelope";
    let header = sign_payload(TEST_WEBHOOK_SECRET, body);
    let (status, body) = post_webhook(&header, body, configure_untouched).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Payload deserialization error"}"#);
}

#[actix_web::test]
async fn fresh_events_credit_commissions() {
    let _ = env_logger::try_init().ok();
    let header = sign_payload(TEST_WEBHOOK_SECRET, PAYMENT_EVENT);
    let (status, body) = post_webhook(&header, PAYMENT_EVENT, configure_payment).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":true"#), "Unexpected response: {body}");
    assert!(body.contains("1 commissions credited"), "Unexpected response: {body}");
}

#[actix_web::test]
async fn failed_handlers_park_the_event() {
    let _ = env_logger::try_init().ok();
    let header = sign_payload(TEST_WEBHOOK_SECRET, PAYMENT_EVENT);
    let (status, body) = post_webhook(&header, PAYMENT_EVENT, configure_park).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":false"#), "Unexpected response: {body}");
    assert!(body.contains("parked"), "Unexpected response: {body}");
}

#[actix_web::test]
async fn duplicate_deliveries_are_acknowledged_without_reprocessing() {
    let _ = env_logger::try_init().ok();
    let header = sign_payload(TEST_WEBHOOK_SECRET, PAYMENT_EVENT);
    let (status, body) = post_webhook(&header, PAYMENT_EVENT, configure_duplicate).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("already processed"), "Unexpected response: {body}");
}

#[actix_web::test]
async fn disputes_claw_back_commissions_and_are_recorded() {
    let _ = env_logger::try_init().ok();
    let header = sign_payload(TEST_WEBHOOK_SECRET, DISPUTE_EVENT);
    let (status, body) = post_webhook(&header, DISPUTE_EVENT, configure_dispute).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":true"#), "Unexpected response: {body}");
}

#[actix_web::test]
async fn unhandled_event_types_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"id":"evt_plan_001","type":"plan.created","data":{"object":{"id":"plan_gold"}}}"#;
    let header = sign_payload(TEST_WEBHOOK_SECRET, body);
    let (status, body) = post_webhook(&header, body, configure_acknowledge_only).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No handler for this event type"), "Unexpected response: {body}");
}

//--------------------------------------   Service configs   --------------------------------------

fn configure_untouched(cfg: &mut ServiceConfig) {
    // No expectations. Any backend call panics the test.
    configure_webhook(cfg, MockCommissionDb::new(), MockCommissionDb::new(), MockCommissionDb::new(), MockCommissionDb::new());
}

fn configure_payment(cfg: &mut ServiceConfig) {
    let mut ledger_db = MockCommissionDb::new();
    ledger_db
        .expect_credit_commission()
        .times(1)
        .withf(|c| c.partner_id == "inf-104" && c.commission_type == CommissionType::ClientReferral && c.source_id == "call-88412")
        .returning(|c| Ok(credited(c)));
    ledger_db.expect_evaluate_recruitment_threshold().times(1).returning(|_, _, _| Ok(None));
    ledger_db.expect_fetch_recruitment_link().times(1).withf(|id| id == "prov-771").returning(|_| Ok(None));
    let mut dedup_db = MockCommissionDb::new();
    dedup_db.expect_begin_event().times(1).returning(|_, _| Ok(DedupStatus::Fresh));
    dedup_db.expect_complete_event().times(1).withf(|id| id == "evt_1PQR7x2eZvKYlo2C4eQxkWVs").returning(|_| Ok(()));
    configure_webhook(cfg, ledger_db, MockCommissionDb::new(), dedup_db, MockCommissionDb::new());
}

fn configure_park(cfg: &mut ServiceConfig) {
    let mut ledger_db = MockCommissionDb::new();
    ledger_db
        .expect_credit_commission()
        .times(1)
        .returning(|_| Err(LedgerError::DatabaseError("database is locked".to_string())));
    // No `complete_event` expectation. Parked events must stay incomplete so the sweep can claim them.
    let mut dedup_db = MockCommissionDb::new();
    dedup_db.expect_begin_event().times(1).returning(|_, _| Ok(DedupStatus::Fresh));
    let mut dlq_db = MockCommissionDb::new();
    dlq_db
        .expect_insert_dead_letter()
        .times(1)
        .withf(|entry| entry.event_id == "evt_1PQR7x2eZvKYlo2C4eQxkWVs" && entry.error.contains("database is locked"))
        .returning(|entry| Ok((parked(entry), true)));
    configure_webhook(cfg, ledger_db, MockCommissionDb::new(), dedup_db, dlq_db);
}

fn configure_duplicate(cfg: &mut ServiceConfig) {
    let mut dedup_db = MockCommissionDb::new();
    dedup_db.expect_begin_event().times(1).returning(|_, _| Ok(DedupStatus::Completed));
    configure_webhook(cfg, MockCommissionDb::new(), MockCommissionDb::new(), dedup_db, MockCommissionDb::new());
}

fn configure_dispute(cfg: &mut ServiceConfig) {
    let mut ledger_db = MockCommissionDb::new();
    ledger_db
        .expect_cancel_commissions_for_source()
        .times(1)
        .withf(|source_id, reason| source_id == "call-88412" && reason == "Charge disputed")
        .returning(|_, _| Ok(vec![17]));
    let mut dispute_db = MockCommissionDb::new();
    dispute_db
        .expect_record_dispute_event()
        .times(1)
        .withf(|update| update.id == "dp_1PQSBz2eZvKYlo2CM0BvGJkx" && !update.closed)
        .returning(|update| Ok(transition(update)));
    let mut dedup_db = MockCommissionDb::new();
    dedup_db.expect_begin_event().times(1).returning(|_, _| Ok(DedupStatus::Fresh));
    dedup_db.expect_complete_event().times(1).returning(|_| Ok(()));
    configure_webhook(cfg, ledger_db, dispute_db, dedup_db, MockCommissionDb::new());
}

fn configure_acknowledge_only(cfg: &mut ServiceConfig) {
    let mut dedup_db = MockCommissionDb::new();
    dedup_db.expect_begin_event().times(1).returning(|_, _| Ok(DedupStatus::Fresh));
    dedup_db.expect_complete_event().times(1).returning(|_| Ok(()));
    configure_webhook(cfg, MockCommissionDb::new(), MockCommissionDb::new(), dedup_db, MockCommissionDb::new());
}

fn configure_webhook(
    cfg: &mut ServiceConfig,
    ledger_db: MockCommissionDb,
    dispute_db: MockCommissionDb,
    dedup_db: MockCommissionDb,
    dlq_db: MockCommissionDb,
) {
    let ledger = LedgerApi::new(ledger_db, CommissionSettings::default(), EventProducers::default());
    let disputes = DisputeApi::new(dispute_db, EventProducers::default());
    let router = EventRouter::new(ledger, disputes, dedup_db);
    let dlq = DlqApi::new(dlq_db, RetryPolicy::default(), EventProducers::default());
    cfg.service(
        web::scope("/webhook")
            .wrap(SignatureMiddlewareFactory::new(test_stripe_config()))
            .service(StripeWebhookRoute::<MockCommissionDb>::new()),
    )
    .app_data(web::Data::new(router))
    .app_data(web::Data::new(dlq));
}

//--------------------------------------    Row builders     --------------------------------------

fn credited(commission: NewCommission) -> CreditOutcome {
    CreditOutcome::Credited(CommissionRecord {
        id: 1,
        partner_id: commission.partner_id,
        partner_role: PartnerRole::Influencer,
        commission_type: commission.commission_type,
        status: CommissionStatus::Pending,
        amount: commission.amount,
        source_id: commission.source_id,
        description: commission.description,
        created_at: Utc::now(),
        validated_at: None,
        available_at: None,
        cancelled_at: None,
        cancellation_reason: None,
    })
}

fn parked(entry: NewDeadLetter) -> DlqEntry {
    DlqEntry {
        event_id: entry.event_id,
        event_type: entry.event_type,
        payload: entry.payload,
        status: DlqStatus::Pending,
        attempts: 1,
        next_retry_at: Some(entry.next_retry_at),
        last_error: Some(entry.error),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn transition(update: DisputeUpdate) -> DisputeTransition {
    DisputeTransition {
        dispute: DisputeRecord {
            id: update.id,
            charge_id: update.charge_id,
            amount: update.amount,
            currency: update.currency,
            reason: update.reason,
            status: update.status,
            outcome: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        created: true,
        status_changed: true,
        outcome_set: None,
    }
}
