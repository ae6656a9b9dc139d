//! The traits in this module are the seams between the storage backend and
//! the rest of the gateway. The server and the API layer are written against
//! these traits only; [`SqliteDatabase`](crate::SqliteDatabase) is the
//! production implementation, and the endpoint tests substitute mocks.
//!
//! The split follows who calls what:
//! * [`LedgerDatabase`] - the mutating ledger operations the event handlers
//!   drive. Everything here is transactional and idempotent.
//! * [`PartnerManagement`] - read-only partner and commission lookups.
//! * [`DisputeManagement`] - the dispute lifecycle tracker.
//! * [`DlqManagement`] - dead letter storage and the retry claim cycle.
//! * [`EventDedup`] - the per-event-id delivery dedup marker.

mod data_objects;
mod dispute_management;
mod dlq_management;
mod event_dedup;
mod ledger_database;
mod partner_management;

pub use data_objects::{
    CommissionQueryFilter,
    DedupStatus,
    DisputeTransition,
    DisputeUpdate,
    MaturationReport,
    PartnerBalance,
};
pub use dispute_management::{DisputeError, DisputeManagement};
pub use dlq_management::{DlqError, DlqManagement};
pub use event_dedup::{DedupError, EventDedup};
pub use ledger_database::{LedgerDatabase, LedgerError};
pub use partner_management::{PartnerApiError, PartnerManagement};

/// Everything the webhook ingestion path needs from one backend value.
pub trait CommissionBackend: LedgerDatabase + DisputeManagement + DlqManagement + EventDedup {}

impl<T> CommissionBackend for T where T: LedgerDatabase + DisputeManagement + DlqManagement + EventDedup {}
