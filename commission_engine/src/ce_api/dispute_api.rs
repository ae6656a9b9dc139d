use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{DisputeRecord, DisputeStatusEntry},
    events::{DisputeAlertEvent, EventProducers},
    traits::{DisputeError, DisputeManagement, DisputeTransition, DisputeUpdate},
};

/// Records dispute lifecycle events and raises one alert per observable transition.
pub struct DisputeApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for DisputeApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DisputeApi")
    }
}

impl<B> DisputeApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> DisputeApi<B>
where B: DisputeManagement
{
    /// Applies a dispute event to the tracker. An alert fires only when something observable
    /// changed, so replayed deliveries stay silent.
    pub async fn apply_dispute_event(&self, update: DisputeUpdate) -> Result<DisputeTransition, DisputeError> {
        let transition = self.db.record_dispute_event(update).await?;
        if !transition.is_noop() {
            for emitter in &self.producers.dispute_alert_producer {
                trace!("⚖️ Notifying dispute alert hook subscribers");
                emitter.publish_event(DisputeAlertEvent::from(transition.clone())).await;
            }
        }
        Ok(transition)
    }

    pub async fn dispute(&self, dispute_id: &str) -> Result<Option<DisputeRecord>, DisputeError> {
        self.db.fetch_dispute(dispute_id).await
    }

    /// The status trail for a dispute, oldest entry first.
    pub async fn history(&self, dispute_id: &str) -> Result<Vec<DisputeStatusEntry>, DisputeError> {
        self.db.dispute_history(dispute_id).await
    }
}
