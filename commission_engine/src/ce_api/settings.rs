use chrono::Duration;
use pcg_common::Cents;

/// Commission amounts and timing knobs.
///
/// Amounts are fixed per commission type and never taken from an event payload, so a forged or
/// corrupted payload cannot inflate a payout. The defaults mirror the marketing team's current
/// programme: $10 per client referral, $5 per network call, and a one-time $5 bonus once a
/// recruit has earned $50 in referrals.
#[derive(Debug, Clone)]
pub struct CommissionSettings {
    /// Credited to the referring partner when their client completes a paid call.
    pub client_referral_amount: Cents,
    /// Credited per call taken by a recruited provider, while the recruitment window is open.
    pub network_bonus_amount: Cents,
    /// One-time bonus paid to a partner's recruiter when the threshold is crossed.
    pub recruitment_bonus_amount: Cents,
    /// Client-referral earnings a recruit must accumulate before the bonus fires.
    pub recruitment_threshold: Cents,
    /// Hold period before a pending commission is validated.
    pub validation_hold: Duration,
    /// Delay between validation and the funds becoming available.
    pub release_delay: Duration,
    /// How long after recruitment the recruiter keeps earning from their recruits.
    pub commission_window: Duration,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self {
            client_referral_amount: Cents::from_dollars(10),
            network_bonus_amount: Cents::from_dollars(5),
            recruitment_bonus_amount: Cents::from_dollars(5),
            recruitment_threshold: Cents::from_dollars(50),
            validation_hold: Duration::days(7),
            release_delay: Duration::hours(24),
            commission_window: Duration::days(180),
        }
    }
}
