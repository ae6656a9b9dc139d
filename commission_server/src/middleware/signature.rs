//! Stripe webhook signature middleware.
//!
//! Stripe signs every delivery with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`, where each `v1` value is the
//! HMAC-SHA256 of `"{t}.{raw body}"` under one of the endpoint's signing secrets. Multiple
//! `v1` entries appear while a secret is being rolled. The timestamp is part of the signed
//! payload, so replaying an old delivery with a fresh `t` fails verification and replaying
//! it verbatim fails the tolerance check.
//!
//! Wrap the webhook scope with this middleware. On success the buffered body is re-injected
//! so the route handler can read it again; on any failure the request is rejected with a 400
//! before any handler runs.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use chrono::{Duration, Utc};
use futures::future::LocalBoxFuture;
use hmac::{Hmac, Mac};
use log::{trace, warn};
use pcg_common::Secret;
use sha2::Sha256;
use thiserror::Error;

use crate::config::StripeConfig;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub struct SignatureMiddlewareFactory {
    config: StripeConfig,
}

impl SignatureMiddlewareFactory {
    pub fn new(config: StripeConfig) -> Self {
        SignatureMiddlewareFactory { config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureMiddlewareService { config: self.config.clone(), service: Rc::new(service) }))
    }
}

pub struct SignatureMiddlewareService<S> {
    config: StripeConfig,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let config = self.config.clone();
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature for request");
            if !config.signature_checks {
                trace!("🔐️ Signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            if config.webhook_secrets.is_empty() {
                warn!("🔐️ No webhook signing secrets are configured. Denying request.");
                return Err(ErrorBadRequest("Webhook signature verification is not configured."));
            }
            let header = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .ok_or_else(|| {
                    warn!("🔐️ No {SIGNATURE_HEADER} header found in request. Denying access.");
                    ErrorBadRequest("Missing signature header.")
                })?;
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            match verify_signature(&header, data.as_ref(), &config.webhook_secrets, config.signature_tolerance) {
                Ok(()) => {
                    trace!("🔐️ Webhook signature check for request ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔐️ Webhook signature rejected. {e}");
                    Err(ErrorBadRequest("Invalid webhook signature."))
                },
            }
        })
    }
}

#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    #[error("The signature header is malformed")]
    MalformedHeader,
    #[error("The signature timestamp is outside the {0}s tolerance")]
    StaleTimestamp(i64),
    #[error("No candidate signature matched any configured secret")]
    NoMatch,
}

/// Verifies a `Stripe-Signature` header against the raw body. Every `v1` candidate is tried
/// against every configured secret; one match passes. The HMAC comparison itself is
/// constant-time via [`Mac::verify_slice`].
pub(crate) fn verify_signature(
    header: &str,
    payload: &[u8],
    secrets: &[Secret<String>],
    tolerance: Duration,
) -> Result<(), SignatureError> {
    let (timestamp, candidates) = parse_signature_header(header)?;
    let age = (Utc::now().timestamp() - timestamp).abs();
    if age > tolerance.num_seconds() {
        return Err(SignatureError::StaleTimestamp(tolerance.num_seconds()));
    }
    let signed_payload = signed_payload(timestamp, payload);
    for secret in secrets {
        let Ok(keyed) = HmacSha256::new_from_slice(secret.reveal().as_bytes()) else {
            continue;
        };
        for candidate in &candidates {
            let mut mac = keyed.clone();
            mac.update(&signed_payload);
            if mac.verify_slice(candidate).is_ok() {
                return Ok(());
            }
        }
    }
    Err(SignatureError::NoMatch)
}

/// The byte string Stripe signs: `"{t}.{body}"`.
pub(crate) fn signed_payload(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut signed = format!("{timestamp}.").into_bytes();
    signed.extend_from_slice(payload);
    signed
}

/// Splits the header into the timestamp and the decoded `v1` candidates. `v0` entries belong
/// to the deprecated scheme and are skipped, as is anything unrecognized.
fn parse_signature_header(header: &str) -> Result<(i64, Vec<Vec<u8>>), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => timestamp = v.parse::<i64>().ok(),
            (Some("v1"), Some(v)) => {
                if let Ok(bytes) = hex::decode(v) {
                    candidates.push(bytes);
                }
            },
            _ => {},
        }
    }
    match timestamp {
        Some(t) if !candidates.is_empty() => Ok((t, candidates)),
        _ => Err(SignatureError::MalformedHeader),
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
