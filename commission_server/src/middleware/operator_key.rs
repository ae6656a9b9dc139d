//! Operator API key middleware.
//!
//! The `/api` scope is for back-office operators, not for Stripe. Every request must carry
//! the shared key in the `x-pcg-operator-key` header. If no key is configured the scope is
//! closed outright rather than left open.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error,
};
use futures::future::{ok, Ready};
use log::{trace, warn};
use pcg_common::Secret;

pub const OPERATOR_KEY_HEADER: &str = "x-pcg-operator-key";

pub struct OperatorKeyMiddlewareFactory {
    key: Secret<String>,
}

impl OperatorKeyMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        OperatorKeyMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OperatorKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = OperatorKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(OperatorKeyMiddlewareService { key: self.key.clone(), service: Rc::new(service) })
    }
}

pub struct OperatorKeyMiddlewareService<S> {
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for OperatorKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let key = self.key.clone();
        Box::pin(async move {
            if key.reveal().is_empty() {
                warn!("🔐️ No operator API key is configured. Denying access to {}", req.path());
                return Err(ErrorUnauthorized("Operator API is not configured."));
            }
            let presented = req.headers().get(OPERATOR_KEY_HEADER).and_then(|v| v.to_str().ok()).ok_or_else(|| {
                warn!("🔐️ No {OPERATOR_KEY_HEADER} header found in request to {}. Denying access.", req.path());
                ErrorUnauthorized("Missing operator API key.")
            })?;
            if !constant_time_eq(presented.as_bytes(), key.reveal().as_bytes()) {
                warn!("🔐️ Invalid operator API key presented for {}. Denying access.", req.path());
                return Err(ErrorUnauthorized("Invalid operator API key."));
            }
            trace!("🔐️ Operator API key check for {} ✅️", req.path());
            service.call(req).await
        })
    }
}

/// Comparison time depends only on the lengths, not on where the bytes differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
