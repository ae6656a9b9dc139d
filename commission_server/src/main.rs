use commission_engine::events::{EventHandlers, EventHooks};
use commission_server::{config::ServerConfig, server::run_server};
use dotenvy::dotenv;
use log::{error, info, warn};

pub const EVENT_BUFFER_SIZE: usize = 32;

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_or_default();
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    info!("🚀️ Starting commission gateway on {}:{}", config.host, config.port);
    match run_server(config, producers).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

/// The stock subscribers write a structured log line for every engine event. A deployment that
/// pushes these into a chat channel or a CRM swaps in its own hooks here.
fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_commission_credited(|ev| {
        Box::pin(async move {
            info!("💰️ {}", ev.commission);
        })
    });
    hooks.on_dispute_alert(|ev| {
        Box::pin(async move {
            if ev.created {
                warn!("⚖️ New dispute opened. {}", ev.dispute);
            } else if let Some(outcome) = ev.outcome_set {
                warn!("⚖️ Dispute {} closed: {outcome}", ev.dispute.id);
            } else if ev.status_changed {
                info!("⚖️ Dispute {} moved to {}", ev.dispute.id, ev.dispute.status);
            }
        })
    });
    hooks.on_dead_letter(|ev| {
        Box::pin(async move {
            error!(
                "📮️ Event {} ({}) exhausted its retries and needs operator attention. Last error: {}",
                ev.entry.event_id,
                ev.entry.event_type,
                ev.entry.last_error.as_deref().unwrap_or("unknown")
            );
        })
    });
    hooks.on_marketing_suppression(|ev| {
        Box::pin(async move {
            info!("🤫️ Network bonus withheld for [{}] on [{}]. {}", ev.partner_id, ev.source_id, ev.reason);
        })
    });
    hooks
}
