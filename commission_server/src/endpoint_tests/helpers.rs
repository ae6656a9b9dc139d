use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use log::debug;
use pcg_common::Secret;
use sha2::Sha256;

use crate::{
    config::StripeConfig,
    middleware::{OPERATOR_KEY_HEADER, SIGNATURE_HEADER},
};

// Test credentials only. DO NOT re-use these values anywhere.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_endpoint_test_secret";
pub const TEST_OPERATOR_KEY: &str = "pcg_op_endpoint_test_key";

pub fn test_stripe_config() -> StripeConfig {
    StripeConfig {
        webhook_secrets: vec![Secret::new(TEST_WEBHOOK_SECRET.to_string())],
        signature_tolerance: Duration::seconds(300),
        signature_checks: true,
    }
}

/// Signs `body` the way the payment processor does: HMAC-SHA256 over `"{t}.{body}"`, hex encoded.
pub fn sign_payload(secret: &str, body: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(format!("{timestamp}.{body}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

pub async fn post_webhook(
    signature: &str,
    body: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri("/webhook/stripe").set_payload(body.to_string());
    if !signature.is_empty() {
        req = req.insert_header((SIGNATURE_HEADER, signature));
    }
    call_service(req, configure).await
}

pub async fn get_request(
    operator_key: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::get().uri(path);
    if !operator_key.is_empty() {
        req = req.insert_header((OPERATOR_KEY_HEADER, operator_key));
    }
    call_service(req, configure).await
}

pub async fn post_request(
    operator_key: &str,
    path: &str,
    body: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post()
        .uri(path)
        .insert_header(("content-type", "application/json"))
        .set_payload(body.to_string());
    if !operator_key.is_empty() {
        req = req.insert_header((OPERATOR_KEY_HEADER, operator_key));
    }
    call_service(req, configure).await
}

async fn call_service(
    req: TestRequest,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
