//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers run on actix worker threads, which process their requests sequentially. Anything
//! slow and non-cpu-bound (database calls, above all) must be awaited, never blocked on, or the
//! worker stops serving other requests.

use actix_web::{get, web, HttpResponse, Responder};
use commission_engine::{
    db_types::NewPartner,
    traits::{DisputeManagement, DlqManagement, LedgerDatabase, PartnerManagement},
    DisputeApi,
    DlqApi,
    LedgerApi,
    PartnerApi,
};
use log::*;
use pcg_common::Cents;

use crate::{
    data_objects::{AdjustmentRequest, CommissionListParams, DisputeView, DlqListParams, NewPartnerRequest, RecruitmentRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Dead letters  ----------------------------------------------

route!(dlq_list => Get "/dlq" impl DlqManagement);
/// Lists dead-lettered events, newest first. `?status=dead` (or any other [`DlqStatus`]) narrows
/// the listing.
///
/// [`DlqStatus`]: commission_engine::db_types::DlqStatus
pub async fn dlq_list<B: DlqManagement>(
    query: web::Query<DlqListParams>,
    api: web::Data<DlqApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = query.into_inner();
    debug!("💻️ GET dead letter entries. Filter: {:?}", params.status);
    let entries = api.list(params.status).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(dlq_retry => Post "/dlq/{event_id}/retry" impl DlqManagement);
/// Puts a dead entry back in the retry queue. Only entries that exhausted their retry budget can
/// be requeued; anything else is a 400.
pub async fn dlq_retry<B: DlqManagement>(
    path: web::Path<String>,
    api: web::Data<DlqApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let event_id = path.into_inner();
    debug!("💻️ POST retry dead letter {event_id}");
    let entry = api.retry_dead(&event_id).await?;
    info!("📮️ Dead letter {} was requeued by an operator. The next sweep will pick it up", entry.event_id);
    Ok(HttpResponse::Ok().json(entry))
}

//----------------------------------------------   Disputes  ----------------------------------------------------

route!(dispute => Get "/disputes/{dispute_id}" impl DisputeManagement);
/// Fetches a dispute together with its append-only status history.
pub async fn dispute<B: DisputeManagement>(
    path: web::Path<String>,
    api: web::Data<DisputeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let dispute_id = path.into_inner();
    debug!("💻️ GET dispute {dispute_id}");
    let record =
        api.dispute(&dispute_id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Dispute {dispute_id}")))?;
    let history = api.history(&dispute_id).await?;
    Ok(HttpResponse::Ok().json(DisputeView { dispute: record, history }))
}

//----------------------------------------------   Partners  ----------------------------------------------------

route!(partner_balance => Get "/partners/{partner_id}/balance" impl PartnerManagement);
/// The partner's balance across the maturation buckets, plus their lifetime earnings.
pub async fn partner_balance<B: PartnerManagement>(
    path: web::Path<String>,
    api: web::Data<PartnerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let partner_id = path.into_inner();
    debug!("💻️ GET balance for partner {partner_id}");
    let balance =
        api.balance(&partner_id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Partner {partner_id}")))?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(partner_commissions => Get "/partners/{partner_id}/commissions" impl PartnerManagement);
/// Lists a partner's commissions. Type, status and time window filters arrive as query
/// parameters, e.g. `?type=client_referral&status=pending&since=2024-06-01T00:00:00Z`.
pub async fn partner_commissions<B: PartnerManagement>(
    path: web::Path<String>,
    query: web::Query<CommissionListParams>,
    api: web::Data<PartnerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let partner_id = path.into_inner();
    let filter = query.into_inner().into_filter(&partner_id);
    debug!("💻️ GET commissions for partner {partner_id}");
    let commissions = api.commissions(filter).await?;
    Ok(HttpResponse::Ok().json(commissions))
}

route!(register_partner => Post "/partners" impl LedgerDatabase);
/// Registers a partner. Re-posting an existing id returns the stored row with a 200 instead of
/// the 201 a fresh registration gets.
pub async fn register_partner<B: LedgerDatabase>(
    body: web::Json<NewPartnerRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST register partner {} as {}", request.id, request.role);
    let partner = NewPartner::new(&request.id, &request.name, request.role).with_status(request.status);
    let (partner, created) = api.register_partner(partner).await?;
    if created {
        info!("💻️ Partner {} ({}) registered", partner.id, partner.role);
        Ok(HttpResponse::Created().json(partner))
    } else {
        debug!("💻️ Partner {} already existed. Returning the stored row", partner.id);
        Ok(HttpResponse::Ok().json(partner))
    }
}

route!(link_recruitment => Post "/partners/{partner_id}/recruitments" impl LedgerDatabase);
/// Records that the partner in the path recruited the partner in the body. A partner can only be
/// recruited once; replays return the existing link.
pub async fn link_recruitment<B: LedgerDatabase>(
    path: web::Path<String>,
    body: web::Json<RecruitmentRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let recruiter_id = path.into_inner();
    let request = body.into_inner();
    debug!("💻️ POST recruitment link {recruiter_id} -> {}", request.recruited_id);
    let (link, created) = api.link_recruitment(&recruiter_id, &request.recruited_id).await?;
    if created {
        info!(
            "💻️ Recruitment recorded. {} recruited {}. Window closes {}",
            link.recruiter_id, link.recruited_id, link.commission_window_end
        );
        Ok(HttpResponse::Created().json(link))
    } else {
        debug!("💻️ {} was already recruited by {}", link.recruited_id, link.recruiter_id);
        Ok(HttpResponse::Ok().json(link))
    }
}

route!(manual_adjustment => Post "/partners/{partner_id}/adjustments" impl LedgerDatabase);
/// Writes an operator adjustment to the partner's ledger. The amount is in cents and may be
/// negative to debit the partner. Adjustments skip the maturation pipeline and are available
/// immediately.
pub async fn manual_adjustment<B: LedgerDatabase>(
    path: web::Path<String>,
    body: web::Json<AdjustmentRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let partner_id = path.into_inner();
    let request = body.into_inner();
    debug!("💻️ POST adjustment of {} cents for partner {partner_id} by {}", request.amount, request.operator);
    let record = api
        .manual_adjustment(&partner_id, Cents::from(request.amount), &request.description, &request.operator)
        .await?;
    info!("💻️ Adjustment #{} of {} written for partner {partner_id}", record.id, record.amount);
    Ok(HttpResponse::Ok().json(record))
}
