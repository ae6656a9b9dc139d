use std::env;

use chrono::Duration;
use commission_engine::{CommissionSettings, RetryPolicy};
use log::*;
use pcg_common::{parse_boolean_flag, Cents, Secret};

const DEFAULT_PCG_HOST: &str = "127.0.0.1";
const DEFAULT_PCG_PORT: u16 = 8480;
/// Stripe rejects replayed signatures older than 5 minutes; we do the same.
const DEFAULT_SIGNATURE_TOLERANCE: Duration = Duration::seconds(300);
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_MATURATION_INTERVAL_SECS: u64 = 3600;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::seconds(60);
const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::hours(6);
const DEFAULT_RETRY_MAX_ATTEMPTS: i64 = 6;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Webhook signature verification settings.
    pub stripe: StripeConfig,
    /// Dead letter retry schedule and sweep cadence.
    pub retry: RetryConfig,
    /// How often the maturation sweep (pending → validated → available) runs.
    pub maturation_interval: std::time::Duration,
    /// Commission amounts and timing. Amounts always come from here, never from event payloads.
    pub commissions: CommissionSettings,
    /// Shared key for the `/api` operator routes. Empty means every operator call is rejected.
    pub operator_api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PCG_HOST.to_string(),
            port: DEFAULT_PCG_PORT,
            database_url: String::default(),
            stripe: StripeConfig::default(),
            retry: RetryConfig::default(),
            maturation_interval: std::time::Duration::from_secs(DEFAULT_MATURATION_INTERVAL_SECS),
            commissions: CommissionSettings::default(),
            operator_api_key: Secret::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PCG_HOST").ok().unwrap_or_else(|| DEFAULT_PCG_HOST.into());
        let port = env::var("PCG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PCG_PORT. {e} Using the default, {DEFAULT_PCG_PORT}, instead."
                    );
                    DEFAULT_PCG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PCG_PORT);
        let database_url = env::var("PCG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ PCG_DATABASE_URL is not set. Please set it to the URL for the commission database.");
            String::default()
        });
        let stripe = StripeConfig::from_env_or_default();
        let retry = RetryConfig::from_env_or_default();
        let maturation_interval = std::time::Duration::from_secs(parse_env_u64(
            "PCG_MATURATION_INTERVAL",
            DEFAULT_MATURATION_INTERVAL_SECS,
            "seconds between maturation sweeps",
        ));
        let commissions = commission_settings_from_env();
        let operator_api_key = env::var("PCG_OPERATOR_API_KEY").ok().unwrap_or_else(|| {
            warn!(
                "🚨️ PCG_OPERATOR_API_KEY is not set. The /api operator routes will reject every request until it is \
                 configured."
            );
            String::default()
        });
        let operator_api_key = Secret::new(operator_api_key);
        Self { host, port, database_url, stripe, retry, maturation_interval, commissions, operator_api_key }
    }
}

//-------------------------------------------------  StripeConfig  -----------------------------------------------------

#[derive(Clone, Debug)]
pub struct StripeConfig {
    /// Signing secrets to try, in order. Live, test and Connect endpoints each have their own.
    pub webhook_secrets: Vec<Secret<String>>,
    /// Maximum age of the `t=` timestamp in the signature header.
    pub signature_tolerance: Duration,
    /// If false, the middleware waves every request through. **DANGER**: only for local testing.
    pub signature_checks: bool,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self { webhook_secrets: Vec::new(), signature_tolerance: DEFAULT_SIGNATURE_TOLERANCE, signature_checks: true }
    }
}

impl StripeConfig {
    pub fn from_env_or_default() -> Self {
        let mut webhook_secrets = Vec::new();
        match env::var("PCG_STRIPE_WEBHOOK_SECRET") {
            Ok(s) if !s.is_empty() => webhook_secrets.push(Secret::new(s)),
            _ => {
                error!(
                    "🪛️ PCG_STRIPE_WEBHOOK_SECRET is not set. Please set it to the signing secret for your Stripe \
                     webhook endpoint."
                );
            },
        }
        if let Ok(s) = env::var("PCG_STRIPE_WEBHOOK_SECRET_TEST") {
            if !s.is_empty() {
                webhook_secrets.push(Secret::new(s));
            }
        }
        match env::var("PCG_STRIPE_CONNECT_WEBHOOK_SECRET") {
            Ok(s) if !s.is_empty() => webhook_secrets.push(Secret::new(s)),
            _ => info!("🪛️ PCG_STRIPE_CONNECT_WEBHOOK_SECRET is not set. Connect events will fail verification."),
        }
        let signature_tolerance =
            Duration::seconds(parse_env_i64("PCG_STRIPE_SIGNATURE_TOLERANCE", DEFAULT_SIGNATURE_TOLERANCE.num_seconds()));
        let signature_checks = parse_boolean_flag(env::var("PCG_STRIPE_SIGNATURE_CHECKS").ok(), true);
        if !signature_checks {
            warn!(
                "🚨️ Stripe signature checks are DISABLED. Anyone who can reach this server can forge payment events. \
                 Never run production like this."
            );
        }
        Self { webhook_secrets, signature_tolerance, signature_checks }
    }
}

//-------------------------------------------------  RetryConfig  ------------------------------------------------------

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// How often the dead letter sweep runs.
    pub sweep_interval: std::time::Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: i64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn from_env_or_default() -> Self {
        let sweep_interval = std::time::Duration::from_secs(parse_env_u64(
            "PCG_DLQ_SWEEP_INTERVAL",
            DEFAULT_SWEEP_INTERVAL_SECS,
            "seconds between dead letter sweeps",
        ));
        let base_delay =
            Duration::seconds(parse_env_i64("PCG_DLQ_BASE_DELAY", DEFAULT_RETRY_BASE_DELAY.num_seconds()));
        let max_delay = Duration::seconds(parse_env_i64("PCG_DLQ_MAX_DELAY", DEFAULT_RETRY_MAX_DELAY.num_seconds()));
        let max_attempts = parse_env_i64("PCG_DLQ_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS);
        let jitter = parse_boolean_flag(env::var("PCG_DLQ_JITTER").ok(), true);
        Self { sweep_interval, base_delay, max_delay, max_attempts, jitter }
    }

    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            max_attempts: self.max_attempts,
            jitter: self.jitter,
        }
    }
}

//-------------------------------------------  Commission settings  ----------------------------------------------------

/// Reads the commission programme from the environment, falling back to the engine defaults.
/// Amounts are in minor currency units (cents).
fn commission_settings_from_env() -> CommissionSettings {
    let defaults = CommissionSettings::default();
    let client_referral_amount =
        Cents::from(parse_env_i64("PCG_COMMISSION_CLIENT_REFERRAL", defaults.client_referral_amount.value()));
    let network_bonus_amount =
        Cents::from(parse_env_i64("PCG_COMMISSION_NETWORK_BONUS", defaults.network_bonus_amount.value()));
    let recruitment_bonus_amount =
        Cents::from(parse_env_i64("PCG_COMMISSION_RECRUITMENT_BONUS", defaults.recruitment_bonus_amount.value()));
    let recruitment_threshold =
        Cents::from(parse_env_i64("PCG_COMMISSION_RECRUITMENT_THRESHOLD", defaults.recruitment_threshold.value()));
    let validation_hold =
        Duration::hours(parse_env_i64("PCG_VALIDATION_HOLD_HOURS", defaults.validation_hold.num_hours()));
    let release_delay = Duration::hours(parse_env_i64("PCG_RELEASE_DELAY_HOURS", defaults.release_delay.num_hours()));
    let commission_window =
        Duration::days(parse_env_i64("PCG_COMMISSION_WINDOW_DAYS", defaults.commission_window.num_days()));
    CommissionSettings {
        client_referral_amount,
        network_bonus_amount,
        recruitment_bonus_amount,
        recruitment_threshold,
        validation_hold,
        release_delay,
        commission_window,
    }
}

fn parse_env_i64(var: &str, default: i64) -> i64 {
    env::var(var)
        .map_err(|_| trace!("🪛️ {var} is not set. Using the default value of {default}."))
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}

fn parse_env_u64(var: &str, default: u64, what: &str) -> u64 {
    env::var(var)
        .map_err(|_| trace!("🪛️ {var} is not set. Using the default of {default} {what}."))
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for {var} ({what}). {e}"))
        })
        .ok()
        .unwrap_or(default)
}
