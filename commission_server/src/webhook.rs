//! The Stripe event envelope and the typed payload objects the router extracts from it.
//!
//! Deserialization is deliberately tolerant: every payload struct ignores unknown fields and
//! defaults the ones we do not strictly need, because Stripe adds fields without notice and a
//! webhook must never start bouncing over cosmetic payload changes. The only hard requirements
//! are the envelope's `id` and `type`, which drive dedup and routing.

use commission_engine::{db_types::DisputeStatus, traits::DisputeUpdate, PaymentAttribution};
use pcg_common::Cents;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Could not extract a {0} object from the event payload. {1}")]
pub struct PayloadError(pub &'static str, pub String);

//--------------------------------------     StripeEvent     --------------------------------------

/// The outer envelope common to every Stripe webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub livemode: bool,
    /// Present on Connect deliveries: the connected account the event belongs to.
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl StripeEvent {
    /// Deserializes `data.object` into the typed payload a handler wants.
    pub fn object<T: DeserializeOwned>(&self, what: &'static str) -> Result<T, PayloadError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| PayloadError(what, e.to_string()))
    }
}

//--------------------------------------    EventMetadata    --------------------------------------

/// The attribution fields the checkout flow stamps into Stripe metadata.
///
/// Older clients wrote camelCase keys, newer ones snake_case; both spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// The partner whose referral link brought the paying client in.
    #[serde(default, alias = "referrerId")]
    pub referrer_id: Option<String>,
    /// The provider who took the call, used to look up who recruited them.
    #[serde(default, alias = "providerId")]
    pub provider_id: Option<String>,
    /// The call session the payment settles. Doubles as the ledger idempotency key.
    #[serde(default, alias = "callSessionId", alias = "sessionId")]
    pub call_session_id: Option<String>,
}

/// Builds the ledger attribution for a settled payment. The source id prefers the call session
/// from metadata so that `payment_intent.succeeded` and `charge.succeeded` for the same payment
/// collapse onto one idempotency key; the payment intent id is the fallback for both.
fn attribution(metadata: &EventMetadata, fallback_source: &str) -> PaymentAttribution {
    let source = metadata.call_session_id.as_deref().unwrap_or(fallback_source);
    let mut attribution = PaymentAttribution::new(source);
    if let Some(referrer) = &metadata.referrer_id {
        attribution = attribution.with_referrer(referrer);
    }
    if let Some(provider) = &metadata.provider_id {
        attribution = attribution.with_provider(provider);
    }
    attribution
}

//--------------------------------------   Payment objects   --------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub latest_charge: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl PaymentIntent {
    pub fn attribution(&self) -> PaymentAttribution {
        attribution(&self.metadata, &self.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl CheckoutSession {
    pub fn attribution(&self) -> PaymentAttribution {
        let fallback = self.payment_intent.as_deref().unwrap_or(&self.id);
        attribution(&self.metadata, fallback)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl Charge {
    pub fn attribution(&self) -> PaymentAttribution {
        let fallback = self.payment_intent.as_deref().unwrap_or(&self.id);
        attribution(&self.metadata, fallback)
    }

    /// The source id commissions for this charge were keyed on.
    pub fn source_id(&self) -> &str {
        self.metadata
            .call_session_id
            .as_deref()
            .or(self.payment_intent.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    #[serde(default)]
    pub charge: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl Refund {
    pub fn is_succeeded(&self) -> bool {
        self.status.as_deref() == Some("succeeded")
    }

    pub fn source_id(&self) -> &str {
        self.metadata
            .call_session_id
            .as_deref()
            .or(self.payment_intent.as_deref())
            .or(self.charge.as_deref())
            .unwrap_or(&self.id)
    }
}

//--------------------------------------       Dispute       --------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub charge: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub reason: String,
    pub status: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl Dispute {
    /// Maps the payload onto a tracker update. Unknown statuses are absorbed, not bounced.
    pub fn to_update(&self) -> DisputeUpdate {
        let status = DisputeStatus::from(self.status.clone());
        DisputeUpdate::new(
            self.id.as_str(),
            self.charge.as_str(),
            Cents::from(self.amount),
            self.currency.as_str(),
            self.reason.as_str(),
            status,
        )
    }

    /// The source id the disputed payment's commissions were keyed on.
    pub fn source_id(&self) -> &str {
        self.metadata
            .call_session_id
            .as_deref()
            .or(self.payment_intent.as_deref())
            .unwrap_or(&self.charge)
    }
}

//--------------------------------------   Ignored objects   --------------------------------------
// The router acknowledges these families without commission impact. The structs exist so the
// ignore log lines can name what was ignored.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
}
