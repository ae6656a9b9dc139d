//! # Commission engine public API
//!
//! The `ce_api` module exposes the programmatic API for the commission engine. The API is
//! modular, so clients can pick the functionality they need. The webhook server uses all of it,
//! but a reporting job, say, only needs [`partner_api`].
//!
//! * [`ledger_api`] credits commissions in response to payment attributions, cancels them on
//!   refunds and disputes, and matures them through the pending-validated-available lifecycle.
//! * [`dispute_api`] records dispute lifecycle transitions and raises alerts.
//! * [`dlq_api`] parks failed webhook deliveries and replays them on an exponential backoff
//!   schedule.
//! * [`partner_api`] is the read surface for partner balances and commission histories.
//!
//! # API usage
//!
//! The pattern for all the APIs is the same. An API instance is created by supplying a database
//! backend that implements the traits the API requires.
//!
//! ```rust,ignore
//! use commission_engine::{ce_api::PartnerApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/commissions.db", 5).await?;
//! // SqliteDatabase implements PartnerManagement
//! let api = PartnerApi::new(db);
//! let balance = api.balance("partner-123").await?;
//! ```

pub mod attribution_objects;
pub mod dispute_api;
pub mod dlq_api;
pub mod ledger_api;
pub mod partner_api;
pub mod settings;
