//! Data objects for the commission ledger.
//!
//! Everything in this module maps 1:1 onto a database row or a value stored in
//! one. Monetary amounts are always [`Cents`]; no floating point is used
//! anywhere in the crediting path.

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, Duration, Utc};
use log::error;
use pcg_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     PartnerRole     --------------------------------------

/// The referral programs all share one ledger. The role records which program
/// a partner signed up under; amounts and thresholds are configuration, not
/// separate code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PartnerRole {
    #[default]
    Affiliate,
    Blogger,
    Influencer,
    GroupAdmin,
}

impl Display for PartnerRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Affiliate => write!(f, "affiliate"),
            Self::Blogger => write!(f, "blogger"),
            Self::Influencer => write!(f, "influencer"),
            Self::GroupAdmin => write!(f, "group_admin"),
        }
    }
}

impl FromStr for PartnerRole {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "affiliate" => Ok(Self::Affiliate),
            "blogger" => Ok(Self::Blogger),
            "influencer" => Ok(Self::Influencer),
            "group_admin" => Ok(Self::GroupAdmin),
            s => Err(ConversionError(format!("Invalid partner role: {s}"))),
        }
    }
}

impl From<String> for PartnerRole {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid partner role: {value}. Defaulting to affiliate");
            Self::Affiliate
        })
    }
}

//--------------------------------------    PartnerStatus    --------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PartnerStatus {
    #[default]
    Active,
    Suspended,
    Flagged,
}

impl Display for PartnerStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
            Self::Flagged => write!(f, "flagged"),
        }
    }
}

impl FromStr for PartnerStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "flagged" => Ok(Self::Flagged),
            s => Err(ConversionError(format!("Invalid partner status: {s}"))),
        }
    }
}

impl From<String> for PartnerStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid partner status: {value}. Defaulting to active");
            Self::Active
        })
    }
}

//--------------------------------------       Partner       --------------------------------------

/// A referral partner and their running balances.
///
/// The three balance buckets track a commission's maturation: credits land in
/// `pending_balance`, move to `validated_balance` after the validation hold,
/// and to `available_balance` after the release delay. Every bucket mutation
/// happens as an atomic increment in the same transaction as the commission
/// row that justifies it, so the buckets always equal the sum of non-cancelled
/// commissions in the matching status.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub role: PartnerRole,
    pub status: PartnerStatus,
    pub pending_balance: Cents,
    pub validated_balance: Cents,
    pub available_balance: Cents,
    pub total_earned: Cents,
    pub total_referrals: i64,
    pub total_recruits: i64,
    pub total_commissions: i64,
    pub stats_month: String,
    pub month_referrals: i64,
    pub month_recruits: i64,
    pub month_earnings: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Partner {
    pub fn is_active(&self) -> bool {
        matches!(self.status, PartnerStatus::Active)
    }
}

impl Display for Partner {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Partner {} ({}, {}, {})", self.id, self.name, self.role, self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartner {
    pub id: String,
    pub name: String,
    pub role: PartnerRole,
    pub status: PartnerStatus,
}

impl NewPartner {
    pub fn new<S1: Into<String>, S2: Into<String>>(id: S1, name: S2, role: PartnerRole) -> Self {
        Self { id: id.into(), name: name.into(), role, status: PartnerStatus::Active }
    }

    pub fn with_status(mut self, status: PartnerStatus) -> Self {
        self.status = status;
        self
    }
}

//--------------------------------------    CommissionType   --------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CommissionType {
    ClientReferral,
    RecruitmentBonus,
    NetworkBonus,
    ManualAdjustment,
}

impl CommissionType {
    pub fn default_description(&self) -> &'static str {
        match self {
            Self::ClientReferral => "Client referral commission",
            Self::RecruitmentBonus => "Recruitment bonus",
            Self::NetworkBonus => "Network bonus",
            Self::ManualAdjustment => "Manual balance adjustment",
        }
    }
}

impl Display for CommissionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientReferral => write!(f, "client_referral"),
            Self::RecruitmentBonus => write!(f, "recruitment_bonus"),
            Self::NetworkBonus => write!(f, "network_bonus"),
            Self::ManualAdjustment => write!(f, "manual_adjustment"),
        }
    }
}

impl FromStr for CommissionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_referral" => Ok(Self::ClientReferral),
            "recruitment_bonus" => Ok(Self::RecruitmentBonus),
            "network_bonus" => Ok(Self::NetworkBonus),
            "manual_adjustment" => Ok(Self::ManualAdjustment),
            s => Err(ConversionError(format!("Invalid commission type: {s}"))),
        }
    }
}

//--------------------------------------   CommissionStatus  --------------------------------------

/// Lifecycle of a commission. The only legal moves are
/// pending → validated → available and {pending, validated} → cancelled.
/// `available` commissions are payout-eligible and can no longer be clawed
/// back through this ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CommissionStatus {
    #[default]
    Pending,
    Validated,
    Available,
    Cancelled,
}

impl Display for CommissionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Validated => write!(f, "validated"),
            Self::Available => write!(f, "available"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for CommissionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "validated" => Ok(Self::Validated),
            "available" => Ok(Self::Available),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid commission status: {s}"))),
        }
    }
}

impl From<String> for CommissionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid commission status: {value}. Defaulting to pending");
            Self::Pending
        })
    }
}

//--------------------------------------   CommissionRecord  --------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: i64,
    pub partner_id: String,
    pub partner_role: PartnerRole,
    pub commission_type: CommissionType,
    pub status: CommissionStatus,
    pub amount: Cents,
    pub source_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub available_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl Display for CommissionRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Commission #{} ({} of {} to {} for {}, {})",
            self.id, self.commission_type, self.amount, self.partner_id, self.source_id, self.status
        )
    }
}

/// A commission waiting to be written. The `(partner_id, source_id,
/// commission_type)` tuple is the idempotency key; inserting the same tuple
/// twice is a no-op at the ledger level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCommission {
    pub partner_id: String,
    pub commission_type: CommissionType,
    pub amount: Cents,
    pub source_id: String,
    pub description: String,
}

impl NewCommission {
    pub fn new<S1, S2>(partner_id: S1, commission_type: CommissionType, amount: Cents, source_id: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            partner_id: partner_id.into(),
            commission_type,
            amount,
            source_id: source_id.into(),
            description: commission_type.default_description().to_string(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }
}

//--------------------------------------    CreditOutcome    --------------------------------------

/// The result of asking the ledger to credit a commission.
///
/// `AlreadyCredited` and `Ineligible` are not errors. Under at-least-once
/// delivery a replayed event is expected to hit the duplicate key, and a
/// suspended partner is a business decision, not a fault. Callers that only
/// care about "did money move" can use [`CreditOutcome::is_credited`].
#[derive(Debug, Clone, Serialize)]
pub enum CreditOutcome {
    /// A new commission row was written and the partner's balance moved.
    Credited(CommissionRecord),
    /// A commission with the same (partner, source, type) key already exists.
    AlreadyCredited(i64),
    /// The partner is missing, suspended, flagged, or the amount was zero.
    Ineligible(String),
}

impl CreditOutcome {
    pub fn is_credited(&self) -> bool {
        matches!(self, Self::Credited(_))
    }

    /// True when the partner holds the commission for this source, whether it
    /// was credited just now or on an earlier delivery.
    pub fn is_attributed(&self) -> bool {
        matches!(self, Self::Credited(_) | Self::AlreadyCredited(_))
    }

    pub fn record(&self) -> Option<&CommissionRecord> {
        match self {
            Self::Credited(rec) => Some(rec),
            _ => None,
        }
    }
}

impl Display for CreditOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credited(rec) => write!(f, "credited ({rec})"),
            Self::AlreadyCredited(id) => write!(f, "already credited as #{id}"),
            Self::Ineligible(reason) => write!(f, "ineligible: {reason}"),
        }
    }
}

//--------------------------------------   RecruitmentLink   --------------------------------------

/// Links a recruit to the partner who signed them up. `commission_paid` flips
/// false → true exactly once, inside a transaction that re-reads the flag, so
/// the recruiter's one-time bonus can never pay out twice.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RecruitmentLink {
    pub id: i64,
    pub recruiter_id: String,
    pub recruited_id: String,
    pub commission_window_end: DateTime<Utc>,
    pub commission_paid: bool,
    pub commission_id: Option<i64>,
    pub commission_paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RecruitmentLink {
    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        self.commission_window_end >= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecruitmentLink {
    pub recruiter_id: String,
    pub recruited_id: String,
    pub commission_window_end: DateTime<Utc>,
}

impl NewRecruitmentLink {
    pub fn new<S1: Into<String>, S2: Into<String>>(recruiter_id: S1, recruited_id: S2, window: Duration) -> Self {
        Self {
            recruiter_id: recruiter_id.into(),
            recruited_id: recruited_id.into(),
            commission_window_end: Utc::now() + window,
        }
    }
}

//--------------------------------------    DisputeStatus    --------------------------------------

/// Processor-defined dispute lifecycle states. The `warning_*` states are the
/// processor's early-fraud previews and precede a real chargeback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DisputeStatus {
    WarningNeedsResponse,
    WarningUnderReview,
    WarningClosed,
    NeedsResponse,
    UnderReview,
    Won,
    Lost,
}

impl DisputeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::WarningClosed)
    }

    /// The outcome a `closed` event implies. The processor reports `won` and
    /// `lost` explicitly; any other closing status means the dispute was
    /// withdrawn without a ruling.
    pub fn outcome_on_close(&self) -> DisputeOutcome {
        match self {
            Self::Won => DisputeOutcome::Won,
            Self::Lost => DisputeOutcome::Lost,
            _ => DisputeOutcome::Withdrawn,
        }
    }
}

impl Display for DisputeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WarningNeedsResponse => "warning_needs_response",
            Self::WarningUnderReview => "warning_under_review",
            Self::WarningClosed => "warning_closed",
            Self::NeedsResponse => "needs_response",
            Self::UnderReview => "under_review",
            Self::Won => "won",
            Self::Lost => "lost",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DisputeStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning_needs_response" => Ok(Self::WarningNeedsResponse),
            "warning_under_review" => Ok(Self::WarningUnderReview),
            "warning_closed" => Ok(Self::WarningClosed),
            "needs_response" => Ok(Self::NeedsResponse),
            "under_review" => Ok(Self::UnderReview),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            s => Err(ConversionError(format!("Invalid dispute status: {s}"))),
        }
    }
}

impl From<String> for DisputeStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid dispute status: {value}. Defaulting to needs_response");
            Self::NeedsResponse
        })
    }
}

//--------------------------------------    DisputeOutcome   --------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DisputeOutcome {
    Won,
    Lost,
    Withdrawn,
}

impl Display for DisputeOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Won => write!(f, "won"),
            Self::Lost => write!(f, "lost"),
            Self::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

impl FromStr for DisputeOutcome {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            "withdrawn" => Ok(Self::Withdrawn),
            s => Err(ConversionError(format!("Invalid dispute outcome: {s}"))),
        }
    }
}

//--------------------------------------    DisputeRecord    --------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DisputeRecord {
    pub id: String,
    pub charge_id: String,
    pub amount: Cents,
    pub currency: String,
    pub reason: String,
    pub status: DisputeStatus,
    pub outcome: Option<DisputeOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Display for DisputeRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Dispute {} on {} ({} {}, {})", self.id, self.charge_id, self.amount, self.currency, self.status)
    }
}

/// One row of a dispute's append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DisputeStatusEntry {
    pub id: i64,
    pub dispute_id: String,
    pub status: DisputeStatus,
    pub recorded_at: DateTime<Utc>,
}

//--------------------------------------      DlqStatus      --------------------------------------

/// Dead letter lifecycle. `pending` entries are due (or will be) for a retry,
/// `sending` entries are claimed by a live sweep, `resolved` entries replayed
/// successfully and `dead` entries exhausted their retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DlqStatus {
    #[default]
    Pending,
    Sending,
    Resolved,
    Dead,
}

impl Display for DlqStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Sending => write!(f, "sending"),
            Self::Resolved => write!(f, "resolved"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

impl FromStr for DlqStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "resolved" => Ok(Self::Resolved),
            "dead" => Ok(Self::Dead),
            s => Err(ConversionError(format!("Invalid dead letter status: {s}"))),
        }
    }
}

impl From<String> for DlqStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid dead letter status: {value}. Defaulting to pending");
            Self::Pending
        })
    }
}

//--------------------------------------      DlqEntry       --------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DlqEntry {
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
    pub status: DlqStatus,
    pub attempts: i64,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Display for DlqEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Dead letter {} ({}, {}, {} attempts)", self.event_id, self.event_type, self.status, self.attempts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeadLetter {
    pub event_id: String,
    pub event_type: String,
    pub payload: String,
    pub error: String,
    pub next_retry_at: DateTime<Utc>,
}

impl NewDeadLetter {
    pub fn new<S1, S2, S3, S4>(event_id: S1, event_type: S2, payload: S3, error: S4, next_retry_at: DateTime<Utc>) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            payload: payload.into(),
            error: error.into(),
            next_retry_at,
        }
    }
}

//--------------------------------------   WebhookEventRow   --------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    #[default]
    Processing,
    Completed,
}

impl Display for WebhookEventStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Delivery-level dedup marker for a webhook event id.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WebhookEventRow {
    pub event_id: String,
    pub event_type: String,
    pub status: WebhookEventStatus,
    pub received_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
