use commission_engine::{
    db_types::DlqEntry,
    events::EventProducers,
    traits::CommissionBackend,
    CommissionSettings,
    DisputeApi,
    DlqApi,
    LedgerApi,
    RetryPolicy,
    SqliteDatabase,
};
use log::*;
use tokio::task::JoinHandle;

use crate::{router::EventRouter, webhook::StripeEvent};

// Entries replayed per pass. Keeps a pass short even after a burst of failures parked a pile of
// events at once; the remainder is simply picked up on the next tick.
const SWEEP_BATCH: i64 = 25;

/// Starts the dead letter sweep worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_dlq_sweep_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    settings: CommissionSettings,
    policy: RetryPolicy,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let ledger = LedgerApi::new(db.clone(), settings, producers.clone());
        let disputes = DisputeApi::new(db.clone(), producers.clone());
        let router = EventRouter::new(ledger, disputes, db.clone());
        let dlq = DlqApi::new(db, policy, producers);
        info!("🕰️ Dead letter sweep worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running dead letter sweep");
            match dlq.sweep(SWEEP_BATCH, |entry| replay_entry(&router, entry)).await {
                Ok(report) if report.is_empty() => trace!("🕰️ No dead letters were due"),
                Ok(report) => info!("🕰️ {report}"),
                Err(e) => error!("🕰️ Error running dead letter sweep: {e}"),
            }
        }
    })
}

/// Replays one parked delivery through the same dispatch path a live webhook takes, dedup
/// bookkeeping included.
async fn replay_entry<B: CommissionBackend>(router: &EventRouter<B>, entry: DlqEntry) -> Result<(), String> {
    let event = serde_json::from_str::<StripeEvent>(&entry.payload)
        .map_err(|e| format!("Could not deserialize the parked payload. {e}"))?;
    let disposition = router.dispatch(&event).await.map_err(|e| e.to_string())?;
    router.complete_event(&event.id).await.map_err(|e| e.to_string())?;
    debug!("🕰️ Replayed {}. {disposition}", event.id);
    Ok(())
}

/// Starts the commission maturation worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_maturation_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    settings: CommissionSettings,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = LedgerApi::new(db, settings, producers);
        info!("🕰️ Commission maturation worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running commission maturation sweep");
            match api.mature().await {
                Ok(report) if report.is_empty() => trace!("🕰️ No commissions were due to mature"),
                Ok(report) => info!("🕰️ {report}"),
                Err(e) => error!("🕰️ Error running commission maturation sweep: {e}"),
            }
        }
    })
}
