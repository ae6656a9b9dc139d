//! Commission Engine
//!
//! The commission engine is the ledger behind the referral programmes: it credits partners when
//! the payments they brought in settle, reverses those credits on refunds and disputes, and
//! guarantees that no payment, threshold crossing or replayed webhook ever pays anyone twice.
//! The library is provider-agnostic; it knows nothing about HTTP or webhook signatures.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). Sqlite is the supported backend. You should
//!    never need to touch the database directly. Instead, use the public API. The exception is
//!    the data types stored in the database, which live in the [`db_types`] module and are
//!    public.
//! 2. The engine public API ([`mod@ce_api`]). This provides the public-facing functionality:
//!    crediting, cancellation, maturation, dispute tracking and the dead letter queue. A backend
//!    acts as a store for the engine by implementing the traits in the [`traits`] module.
//!
//! The engine also emits events when notable things happen (a commission is credited, a dispute
//! moves, a dead letter exhausts its retries). A small actor framework in [`events`] lets callers
//! hook into these without blocking the ingestion path.
mod db;

pub mod ce_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use ce_api::{
    attribution_objects::{AttributionReport, PaymentAttribution},
    dispute_api::DisputeApi,
    dlq_api::{DlqApi, RetryPolicy, SweepReport},
    ledger_api::LedgerApi,
    partner_api::PartnerApi,
    settings::CommissionSettings,
};
