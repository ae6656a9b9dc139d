//! Maps verified Stripe events onto commission engine operations.
//!
//! The router owns no HTTP concerns. It receives an already-verified [`StripeEvent`], picks the
//! handler for its `type`, extracts the typed payload object, and drives the ledger or the
//! dispute tracker. Both the live webhook route and the dead-letter sweep replay go through
//! [`EventRouter::dispatch`], which is what keeps a replayed event byte-for-byte equivalent to a
//! fresh delivery.

use std::fmt::{self, Display, Formatter};

use commission_engine::{
    traits::{CommissionBackend, DedupError, DedupStatus, DisputeError, DisputeTransition, LedgerError},
    AttributionReport,
    DisputeApi,
    LedgerApi,
    PaymentAttribution,
};
use log::{debug, info};
use thiserror::Error;

use crate::webhook::{
    Account,
    Charge,
    CheckoutSession,
    Dispute,
    Invoice,
    PaymentIntent,
    PaymentMethod,
    PayloadError,
    Refund,
    StripeEvent,
    Subscription,
    Transfer,
};

#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Payload(#[from] PayloadError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Dispute tracker error: {0}")]
    Dispute(#[from] DisputeError),
}

//--------------------------------------     Disposition     --------------------------------------

/// What the router did with one event.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// A settled payment ran the crediting programme.
    Attributed(AttributionReport),
    /// The commissions keyed on the source were pulled back.
    Cancelled { source_id: String, commissions: Vec<i64> },
    /// The dispute tracker recorded the notification.
    DisputeRecorded(DisputeTransition),
    /// A recognized event family with no commission impact.
    Ignored(&'static str),
    /// An event type with no handler at all.
    Unhandled,
}

impl Display for Disposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attributed(report) => write!(f, "{report}"),
            Self::Cancelled { source_id, commissions } => {
                write!(f, "Cancelled {} commission(s) keyed on [{source_id}]", commissions.len())
            },
            Self::DisputeRecorded(transition) if transition.is_noop() => {
                write!(f, "{}. No change", transition.dispute)
            },
            Self::DisputeRecorded(transition) => write!(f, "{}", transition.dispute),
            Self::Ignored(reason) => write!(f, "Ignored. {reason}"),
            Self::Unhandled => write!(f, "No handler for this event type"),
        }
    }
}

//--------------------------------------     EventRouter     --------------------------------------

/// One router instance is shared by every request on a worker, and another lives inside the
/// dead-letter sweep task. It is `Send`/`Sync` whenever the backend is.
pub struct EventRouter<B> {
    ledger: LedgerApi<B>,
    disputes: DisputeApi<B>,
    dedup: B,
}

impl<B> EventRouter<B>
where B: CommissionBackend
{
    pub fn new(ledger: LedgerApi<B>, disputes: DisputeApi<B>, dedup: B) -> Self {
        Self { ledger, disputes, dedup }
    }

    /// Registers a delivery attempt for the event id. See [`DedupStatus`] for what the caller
    /// should do with the answer.
    pub async fn begin_event(&self, event_id: &str, event_type: &str) -> Result<DedupStatus, DedupError> {
        self.dedup.begin_event(event_id, event_type).await
    }

    /// Marks the event fully handled, so later deliveries of the same id short-circuit.
    pub async fn complete_event(&self, event_id: &str) -> Result<(), DedupError> {
        self.dedup.complete_event(event_id).await
    }

    /// Runs the handler for the event's `type`.
    ///
    /// Every handler is idempotent, so dispatching the same event twice (a Stripe redelivery, a
    /// crashed pod, a dead-letter replay racing a live retry) converges on the same ledger state.
    pub async fn dispatch(&self, event: &StripeEvent) -> Result<Disposition, HandlerError> {
        if let Some(account) = &event.account {
            debug!("🛍️️ Event {} was delivered for connected account {account}", event.id);
        }
        match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                let intent: PaymentIntent = event.object("payment intent")?;
                debug!("💰️ Payment intent {} settled for {} {}", intent.id, intent.amount, intent.currency);
                self.attribute(intent.attribution()).await
            },
            "checkout.session.completed" => {
                let session: CheckoutSession = event.object("checkout session")?;
                debug!("💰️ Checkout session {} completed", session.id);
                self.attribute(session.attribution()).await
            },
            "charge.succeeded" | "charge.captured" => {
                let charge: Charge = event.object("charge")?;
                debug!("💰️ Charge {} settled for {}", charge.id, charge.amount);
                self.attribute(charge.attribution()).await
            },
            "charge.refunded" => {
                let charge: Charge = event.object("charge")?;
                self.cancel(charge.source_id(), "Charge refunded").await
            },
            "refund.updated" => {
                let refund: Refund = event.object("refund")?;
                if refund.is_succeeded() {
                    self.cancel(refund.source_id(), "Refund succeeded").await
                } else {
                    debug!("📣️ Refund {} is {:?}. Waiting for a terminal status", refund.id, refund.status);
                    Ok(Disposition::Ignored("The refund has not reached a terminal state"))
                }
            },
            "charge.dispute.created" => {
                let dispute: Dispute = event.object("dispute")?;
                // Funds are withdrawn the moment a dispute opens, so the commission claw-back
                // happens here and not when the dispute closes.
                let cancelled = self.ledger.cancel_source(dispute.source_id(), "Charge disputed").await?;
                info!(
                    "⚖️ Dispute {} opened on charge {}. Cancelled {} commission(s)",
                    dispute.id,
                    dispute.charge,
                    cancelled.len()
                );
                self.record_dispute(&dispute, false).await
            },
            "charge.dispute.updated" | "charge.dispute.funds_withdrawn" | "charge.dispute.funds_reinstated" => {
                let dispute: Dispute = event.object("dispute")?;
                self.record_dispute(&dispute, false).await
            },
            "charge.dispute.closed" => {
                let dispute: Dispute = event.object("dispute")?;
                self.record_dispute(&dispute, true).await
            },
            t if t.starts_with("customer.subscription.") => {
                let subscription: Subscription = event.object("subscription")?;
                debug!("📣️ Subscription {} event ({t}) carries no commission. Acknowledged", subscription.id);
                Ok(Disposition::Ignored("Subscription lifecycle events carry no commission"))
            },
            t if t.starts_with("invoice.") => {
                let invoice: Invoice = event.object("invoice")?;
                debug!("📣️ Invoice {} event ({t}) carries no commission. Acknowledged", invoice.id);
                Ok(Disposition::Ignored("Invoice events carry no commission"))
            },
            t if t.starts_with("payment_method.") => {
                let method: PaymentMethod = event.object("payment method")?;
                debug!("📣️ Payment method {} event ({t}) acknowledged", method.id);
                Ok(Disposition::Ignored("Payment method events carry no commission"))
            },
            t if t.starts_with("transfer.") => {
                let transfer: Transfer = event.object("transfer")?;
                debug!("📣️ Transfer {} event ({t}) acknowledged", transfer.id);
                Ok(Disposition::Ignored("Transfers are payouts, not revenue"))
            },
            t if t.starts_with("account.") => {
                let account: Account = event.object("account")?;
                debug!("📣️ Account {} event ({t}) acknowledged", account.id);
                Ok(Disposition::Ignored("Connected account updates carry no commission"))
            },
            t => {
                debug!("📣️ No handler for event type {t}. Acknowledging {}", event.id);
                Ok(Disposition::Unhandled)
            },
        }
    }

    async fn attribute(&self, attribution: PaymentAttribution) -> Result<Disposition, HandlerError> {
        let report = self.ledger.process_payment_attribution(attribution).await?;
        if report.credited_count() > 0 {
            info!("💰️ {report}");
        }
        Ok(Disposition::Attributed(report))
    }

    async fn cancel(&self, source_id: &str, reason: &str) -> Result<Disposition, HandlerError> {
        let commissions = self.ledger.cancel_source(source_id, reason).await?;
        if commissions.is_empty() {
            debug!("💸️ {reason}, but no commissions were keyed on [{source_id}]");
        } else {
            info!("💸️ {reason}. Cancelled {} commission(s) keyed on [{source_id}]", commissions.len());
        }
        Ok(Disposition::Cancelled { source_id: source_id.to_string(), commissions })
    }

    async fn record_dispute(&self, dispute: &Dispute, closing: bool) -> Result<Disposition, HandlerError> {
        let mut update = dispute.to_update();
        if closing {
            update = update.closing();
        }
        let transition = self.disputes.apply_dispute_event(update).await?;
        info!("⚖️ {}", Disposition::DisputeRecorded(transition.clone()));
        Ok(Disposition::DisputeRecorded(transition))
    }
}
