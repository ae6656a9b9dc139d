use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use commission_engine::{events::EventProducers, DisputeApi, DlqApi, LedgerApi, PartnerApi, SqliteDatabase};
use log::info;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::{OperatorKeyMiddlewareFactory, SignatureMiddlewareFactory},
    router::EventRouter,
    routes::{
        health,
        DisputeRoute,
        DlqListRoute,
        DlqRetryRoute,
        LinkRecruitmentRoute,
        ManualAdjustmentRoute,
        PartnerBalanceRoute,
        PartnerCommissionsRoute,
        RegisterPartnerRoute,
    },
    sweep_worker::{start_dlq_sweep_worker, start_maturation_worker},
    webhook_routes::StripeWebhookRoute,
};

pub async fn run_server(config: ServerConfig, producers: EventProducers) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database ready at {}", config.database_url);
    let _sweep = start_dlq_sweep_worker(
        db.clone(),
        producers.clone(),
        config.commissions.clone(),
        config.retry.to_policy(),
        config.retry.sweep_interval,
    );
    let _maturation =
        start_maturation_worker(db.clone(), producers.clone(), config.commissions.clone(), config.maturation_interval);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let ledger_api = LedgerApi::new(db.clone(), config.commissions.clone(), producers.clone());
        let dispute_api = DisputeApi::new(db.clone(), producers.clone());
        let partner_api = PartnerApi::new(db.clone());
        let dlq_api = DlqApi::new(db.clone(), config.retry.to_policy(), producers.clone());
        let router = EventRouter::new(
            LedgerApi::new(db.clone(), config.commissions.clone(), producers.clone()),
            DisputeApi::new(db.clone(), producers.clone()),
            db.clone(),
        );
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pcg::access_log"))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(dispute_api))
            .app_data(web::Data::new(partner_api))
            .app_data(web::Data::new(dlq_api))
            .app_data(web::Data::new(router));
        // Stripe deliveries land here. The signature gate runs before any handler does.
        let webhook_scope = web::scope("/webhook")
            .wrap(SignatureMiddlewareFactory::new(config.stripe.clone()))
            .service(StripeWebhookRoute::<SqliteDatabase>::new());
        // Back-office routes, all behind the shared operator key.
        let api_scope = web::scope("/api")
            .wrap(OperatorKeyMiddlewareFactory::new(config.operator_api_key.clone()))
            .service(DlqListRoute::<SqliteDatabase>::new())
            .service(DlqRetryRoute::<SqliteDatabase>::new())
            .service(DisputeRoute::<SqliteDatabase>::new())
            .service(PartnerBalanceRoute::<SqliteDatabase>::new())
            .service(PartnerCommissionsRoute::<SqliteDatabase>::new())
            .service(RegisterPartnerRoute::<SqliteDatabase>::new())
            .service(LinkRecruitmentRoute::<SqliteDatabase>::new())
            .service(ManualAdjustmentRoute::<SqliteDatabase>::new());
        app.service(health).service(webhook_scope).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
