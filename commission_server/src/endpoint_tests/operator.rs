use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use commission_engine::{
    db_types::{
        CommissionRecord,
        CommissionStatus,
        CommissionType,
        DisputeRecord,
        DisputeStatus,
        DisputeStatusEntry,
        DlqEntry,
        DlqStatus,
        NewPartner,
        NewRecruitmentLink,
        Partner,
        PartnerRole,
        PartnerStatus,
        RecruitmentLink,
    },
    events::EventProducers,
    traits::{DlqError, PartnerBalance},
    CommissionSettings,
    DisputeApi,
    DlqApi,
    LedgerApi,
    PartnerApi,
    RetryPolicy,
};
use pcg_common::{Cents, Secret};

use super::{
    helpers::{get_request, post_request, TEST_OPERATOR_KEY},
    mocks::MockCommissionDb,
};
use crate::{
    middleware::OperatorKeyMiddlewareFactory,
    routes::{
        health,
        DisputeRoute,
        DlqListRoute,
        DlqRetryRoute,
        LinkRecruitmentRoute,
        ManualAdjustmentRoute,
        PartnerBalanceRoute,
        PartnerCommissionsRoute,
        RegisterPartnerRoute,
    },
};

#[actix_web::test]
async fn the_health_endpoint_is_open() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/health", configure_health).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn operator_routes_require_the_api_key() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/api/partners/inf-104/balance", configure_balance).await.expect_err("Expected a rejection");
    assert_eq!(err, "Missing operator API key.");
    let err = get_request("pcg_op_wrong_key", "/api/partners/inf-104/balance", configure_balance)
        .await
        .expect_err("Expected a rejection");
    assert_eq!(err, "Invalid operator API key.");
}

#[actix_web::test]
async fn an_unconfigured_key_closes_the_api() {
    let _ = env_logger::try_init().ok();
    let err = get_request(TEST_OPERATOR_KEY, "/api/partners/inf-104/balance", configure_no_key)
        .await
        .expect_err("Expected a rejection");
    assert_eq!(err, "Operator API is not configured.");
}

#[actix_web::test]
async fn partner_balances_are_returned() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(TEST_OPERATOR_KEY, "/api/partners/inf-104/balance", configure_balance).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"partner_id":"inf-104","pending":1000,"validated":500,"available":2500,"total_earned":4000}"#);
}

#[actix_web::test]
async fn missing_partners_are_a_404() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(TEST_OPERATOR_KEY, "/api/partners/inf-999/balance", configure_missing_balance)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Partner inf-999"}"#);
}

#[actix_web::test]
async fn commission_listings_honour_query_filters() {
    let _ = env_logger::try_init().ok();
    let path = "/api/partners/inf-104/commissions?type=client_referral&status=pending";
    let (status, body) = get_request(TEST_OPERATOR_KEY, path, configure_commissions).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn dead_letters_are_listed_by_status() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(TEST_OPERATOR_KEY, "/api/dlq?status=dead", configure_dlq_list).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("evt_dead_001"), "Unexpected response: {body}");
}

#[actix_web::test]
async fn a_dead_entry_can_be_requeued() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request(TEST_OPERATOR_KEY, "/api/dlq/evt_dead_001/retry", "", configure_dlq_retry).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"pending""#), "Unexpected response: {body}");
}

#[actix_web::test]
async fn only_dead_entries_can_be_requeued() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request(TEST_OPERATOR_KEY, "/api/dlq/evt_live_001/retry", "", configure_dlq_retry_refused)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Could not read request body: Dead letter entry evt_live_001 is pending, not dead"}"#);
}

#[actix_web::test]
async fn partners_can_be_registered() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"id":"aff-201","name":"Dana Li","role":"affiliate"}"#;
    let (status, response) =
        post_request(TEST_OPERATOR_KEY, "/api/partners", body, configure_register).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    assert!(response.contains(r#""id":"aff-201""#), "Unexpected response: {response}");
    assert!(response.contains(r#""role":"affiliate""#), "Unexpected response: {response}");
}

#[actix_web::test]
async fn recruitments_are_linked_once() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"recruited_id":"prov-771"}"#;
    let (status, response) = post_request(TEST_OPERATOR_KEY, "/api/partners/inf-104/recruitments", body, configure_recruitment)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    assert!(response.contains(r#""recruited_id":"prov-771""#), "Unexpected response: {response}");
    // Replaying the same link returns the stored row without a 201.
    let (status, _) = post_request(TEST_OPERATOR_KEY, "/api/partners/inf-104/recruitments", body, configure_existing_recruitment)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn adjustments_are_written_to_the_ledger() {
    let _ = env_logger::try_init().ok();
    let body = r#"{"amount":-500,"description":"Promotion clawback","operator":"ops@pourcel.example"}"#;
    let (status, response) = post_request(TEST_OPERATOR_KEY, "/api/partners/inf-104/adjustments", body, configure_adjustment)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""commission_type":"manual_adjustment""#), "Unexpected response: {response}");
    assert!(response.contains(r#""amount":-500"#), "Unexpected response: {response}");
}

#[actix_web::test]
async fn disputes_are_returned_with_their_history() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(TEST_OPERATOR_KEY, "/api/disputes/dp_001", configure_dispute_view).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""needs_response""#), "Unexpected response: {body}");
    assert!(body.contains(r#""history""#), "Unexpected response: {body}");
}

#[actix_web::test]
async fn unknown_disputes_are_a_404() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(TEST_OPERATOR_KEY, "/api/disputes/dp_999", configure_missing_dispute)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Dispute dp_999"}"#);
}

//--------------------------------------   Service configs   --------------------------------------

fn operator_gate() -> OperatorKeyMiddlewareFactory {
    OperatorKeyMiddlewareFactory::new(Secret::new(TEST_OPERATOR_KEY.to_string()))
}

fn configure_health(cfg: &mut ServiceConfig) {
    cfg.service(health);
}

fn configure_balance(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_fetch_balance().returning(|id| {
        Ok(Some(PartnerBalance {
            partner_id: id.to_string(),
            pending: Cents::from(1000),
            validated: Cents::from(500),
            available: Cents::from(2500),
            total_earned: Cents::from(4000),
        }))
    });
    cfg.service(web::scope("/api").wrap(operator_gate()).service(PartnerBalanceRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(PartnerApi::new(db)));
}

fn configure_no_key(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .wrap(OperatorKeyMiddlewareFactory::new(Secret::new(String::new())))
            .service(PartnerBalanceRoute::<MockCommissionDb>::new()),
    )
    .app_data(web::Data::new(PartnerApi::new(MockCommissionDb::new())));
}

fn configure_missing_balance(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_fetch_balance().returning(|_| Ok(None));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(PartnerBalanceRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(PartnerApi::new(db)));
}

fn configure_commissions(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_fetch_commissions()
        .withf(|filter| {
            filter.partner_id.as_deref() == Some("inf-104")
                && filter.commission_type == Some(CommissionType::ClientReferral)
                && filter.statuses == vec![CommissionStatus::Pending]
        })
        .returning(|_| Ok(Vec::new()));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(PartnerCommissionsRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(PartnerApi::new(db)));
}

fn configure_dlq_list(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_list_dead_letters()
        .withf(|status| *status == Some(DlqStatus::Dead))
        .returning(|_| Ok(vec![dead_entry("evt_dead_001", DlqStatus::Dead)]));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(DlqListRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(DlqApi::new(db, RetryPolicy::default(), EventProducers::default())));
}

fn configure_dlq_retry(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_retry_dead()
        .withf(|event_id| event_id == "evt_dead_001")
        .returning(|id| Ok(dead_entry(id, DlqStatus::Pending)));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(DlqRetryRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(DlqApi::new(db, RetryPolicy::default(), EventProducers::default())));
}

fn configure_dlq_retry_refused(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_retry_dead()
        .returning(|id| Err(DlqError::NotDead { event_id: id.to_string(), status: DlqStatus::Pending }));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(DlqRetryRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(DlqApi::new(db, RetryPolicy::default(), EventProducers::default())));
}

fn configure_register(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_register_partner()
        .withf(|p| p.id == "aff-201" && p.role == PartnerRole::Affiliate && p.status == PartnerStatus::Active)
        .returning(|p| Ok((partner_row(p), true)));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(RegisterPartnerRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(ledger_api(db)));
}

fn configure_recruitment(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_link_recruitment()
        .withf(|link| link.recruiter_id == "inf-104" && link.recruited_id == "prov-771")
        .returning(|link| Ok((link_row(link), true)));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(LinkRecruitmentRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(ledger_api(db)));
}

fn configure_existing_recruitment(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_link_recruitment().returning(|link| Ok((link_row(link), false)));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(LinkRecruitmentRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(ledger_api(db)));
}

fn configure_adjustment(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_manual_adjustment()
        .withf(|partner_id, amount, _, operator| {
            partner_id == "inf-104" && *amount == Cents::from(-500) && operator == "ops@pourcel.example"
        })
        .returning(|partner_id, amount, description, _| Ok(adjustment_row(partner_id, amount, description)));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(ManualAdjustmentRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(ledger_api(db)));
}

fn configure_dispute_view(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_fetch_dispute().returning(|id| Ok(Some(dispute_row(id))));
    db.expect_dispute_history().returning(|id| {
        Ok(vec![DisputeStatusEntry {
            id: 1,
            dispute_id: id.to_string(),
            status: DisputeStatus::NeedsResponse,
            recorded_at: Utc::now(),
        }])
    });
    cfg.service(web::scope("/api").wrap(operator_gate()).service(DisputeRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(DisputeApi::new(db, EventProducers::default())));
}

fn configure_missing_dispute(cfg: &mut ServiceConfig) {
    let mut db = MockCommissionDb::new();
    db.expect_fetch_dispute().returning(|_| Ok(None));
    cfg.service(web::scope("/api").wrap(operator_gate()).service(DisputeRoute::<MockCommissionDb>::new()))
        .app_data(web::Data::new(DisputeApi::new(db, EventProducers::default())));
}

fn ledger_api(db: MockCommissionDb) -> LedgerApi<MockCommissionDb> {
    LedgerApi::new(db, CommissionSettings::default(), EventProducers::default())
}

//--------------------------------------    Row builders     --------------------------------------

fn dead_entry(event_id: &str, status: DlqStatus) -> DlqEntry {
    DlqEntry {
        event_id: event_id.to_string(),
        event_type: "payment_intent.succeeded".to_string(),
        payload: "{}".to_string(),
        status,
        attempts: 6,
        next_retry_at: None,
        last_error: Some("database is locked".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn partner_row(partner: NewPartner) -> Partner {
    Partner {
        id: partner.id,
        name: partner.name,
        role: partner.role,
        status: partner.status,
        pending_balance: Cents::default(),
        validated_balance: Cents::default(),
        available_balance: Cents::default(),
        total_earned: Cents::default(),
        total_referrals: 0,
        total_recruits: 0,
        total_commissions: 0,
        stats_month: "2024-06".to_string(),
        month_referrals: 0,
        month_recruits: 0,
        month_earnings: Cents::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn link_row(link: NewRecruitmentLink) -> RecruitmentLink {
    RecruitmentLink {
        id: 1,
        recruiter_id: link.recruiter_id,
        recruited_id: link.recruited_id,
        commission_window_end: link.commission_window_end,
        commission_paid: false,
        commission_id: None,
        commission_paid_at: None,
        created_at: Utc::now(),
    }
}

fn adjustment_row(partner_id: &str, amount: Cents, description: &str) -> CommissionRecord {
    CommissionRecord {
        id: 42,
        partner_id: partner_id.to_string(),
        partner_role: PartnerRole::Influencer,
        commission_type: CommissionType::ManualAdjustment,
        status: CommissionStatus::Available,
        amount,
        source_id: "manual".to_string(),
        description: description.to_string(),
        created_at: Utc::now(),
        validated_at: None,
        available_at: Some(Utc::now()),
        cancelled_at: None,
        cancellation_reason: None,
    }
}

fn dispute_row(dispute_id: &str) -> DisputeRecord {
    DisputeRecord {
        id: dispute_id.to_string(),
        charge_id: "ch_3PQR7w2eZvKYlo2C1WemTJSO".to_string(),
        amount: Cents::from(2500),
        currency: "usd".to_string(),
        reason: "fraudulent".to_string(),
        status: DisputeStatus::NeedsResponse,
        outcome: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
