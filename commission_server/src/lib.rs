//! # Partner commission gateway server
//! This crate hosts the HTTP front of the commission gateway. It is responsible for:
//! Listening for incoming webhook deliveries from Stripe and verifying their signatures.
//! Routing each event to the commission engine, so settled payments credit partners and refunds
//! and disputes claw those credits back.
//! Parking failed deliveries in the dead letter queue and replaying them on a backoff schedule.
//! Serving the back-office API that operators use to inspect partners, disputes and dead letters.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/stripe`: The signature-gated webhook route for Stripe event deliveries.
//! * `/api/...`: Operator routes for partners, commissions, disputes and the dead letter queue,
//!   gated on the `x-pcg-operator-key` header.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod server;
pub mod sweep_worker;
pub mod webhook;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
