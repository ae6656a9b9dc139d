//----------------------------------------------   Stripe webhook   ----------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use commission_engine::{
    traits::{CommissionBackend, DedupStatus},
    DlqApi,
};
use log::{debug, info, trace, warn};

use crate::{data_objects::JsonResponse, errors::ServerError, route, router::EventRouter, webhook::StripeEvent};

route!(stripe_webhook => Post "/stripe" impl CommissionBackend);
/// The single ingestion endpoint for Stripe deliveries. The signature middleware has already
/// verified the body by the time this runs.
pub async fn stripe_webhook<B: CommissionBackend>(
    req: HttpRequest,
    body: web::Bytes,
    router: web::Data<EventRouter<B>>,
    dlq: web::Data<DlqApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🛍️️ Received webhook request: {}", req.uri());
    let event = serde_json::from_slice::<StripeEvent>(&body).map_err(|e| {
        warn!("🛍️️ Could not deserialize the event envelope. {e}");
        ServerError::CouldNotDeserializePayload
    })?;
    debug!("🛍️️ Event {} ({}){} received", event.id, event.event_type, if event.livemode { "" } else { " [test mode]" });
    // Webhook responses must be in the 200 range once the envelope is readable, otherwise Stripe
    // retries the delivery. Handler failures are parked in the dead letter queue and acknowledged;
    // dedup or parking failures are the exception, where a 500 leans on Stripe's own retry.
    let result = match router.begin_event(&event.id, &event.event_type).await? {
        DedupStatus::Completed => {
            info!("🛍️️ Event {} was already processed. Acknowledging without re-running handlers", event.id);
            JsonResponse::success("Event already processed.")
        },
        status => {
            if status == DedupStatus::InFlight {
                warn!("🛍️️ Event {} is already in flight. Handlers are idempotent, so running them again", event.id);
            }
            match router.dispatch(&event).await {
                Ok(disposition) => {
                    debug!("🛍️️ Event {} handled. {disposition}", event.id);
                    router.complete_event(&event.id).await?;
                    JsonResponse::success(disposition.to_string())
                },
                Err(e) => {
                    warn!("🛍️️ Handler for event {} failed. Parking it for retry. {e}", event.id);
                    let payload = String::from_utf8_lossy(&body);
                    let (entry, created) = dlq.enqueue(&event.id, &event.event_type, payload.as_ref(), &e.to_string()).await?;
                    if created {
                        let due = entry.next_retry_at.map(|t| t.to_string()).unwrap_or_else(|| "the next sweep".to_string());
                        info!("📮️ Event {} parked. First retry due at {due}", entry.event_id);
                    } else {
                        debug!("📮️ Event {} is already parked. {} attempt(s) so far", entry.event_id, entry.attempts);
                    }
                    JsonResponse::failure("Event parked for retry.")
                },
            }
        },
    };
    Ok(HttpResponse::Ok().json(result))
}
