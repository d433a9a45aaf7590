// =============================================================================
// Configuration — read once from the environment, validated at startup
// =============================================================================
//
// Every setting comes from an environment variable (a `.env` file is loaded by
// `main` before this runs). Missing or malformed values stop the process
// before the scheduler starts; nothing is looked up lazily afterwards.
// =============================================================================

use thiserror::Error;
use tracing::info;

use crate::binance::client::DEFAULT_BASE_URL;
use crate::scheduler::{PollSchedule, DEFAULT_CHECK_FOR_MINUTES, DEFAULT_INTERVAL_MINUTES};
use crate::types::{Credentials, WithdrawalTarget};

pub const API_KEY_VAR: &str = "BINANCE_API_KEY";
pub const API_SECRET_VAR: &str = "BINANCE_API_SECRET";
pub const ADDRESS_VAR: &str = "WITHDRAWAL_ADDRESS";
pub const NETWORK_VAR: &str = "WITHDRAWAL_NETWORK";
pub const MEMO_VAR: &str = "WITHDRAWAL_MEMO";
pub const COIN_VAR: &str = "COIN";
pub const BASE_URL_VAR: &str = "BINANCE_BASE_URL";
pub const RECV_WINDOW_VAR: &str = "BINANCE_RECV_WINDOW";
pub const INTERVAL_VAR: &str = "WITHDRAW_INTERVAL_MINUTES";
pub const CHECK_FOR_VAR: &str = "WITHDRAW_CHECK_FOR_MINUTES";

/// Upper bound for either cadence setting (one week).
const MAX_CADENCE_MINUTES: u64 = 7 * 24 * 60;

/// Largest recvWindow the exchange accepts.
const MAX_RECV_WINDOW: u64 = 60_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the sweeper needs, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub target: WithdrawalTarget,
    pub schedule: PollSchedule,
    pub base_url: String,
    pub recv_window: Option<u64>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary `name -> value` lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials {
            api_key: required(&lookup, API_KEY_VAR)?,
            api_secret: required(&lookup, API_SECRET_VAR)?,
        };

        let target = WithdrawalTarget {
            coin: required(&lookup, COIN_VAR)?,
            network: required(&lookup, NETWORK_VAR)?,
            address: required(&lookup, ADDRESS_VAR)?,
            memo: optional(&lookup, MEMO_VAR),
        };

        let schedule = PollSchedule {
            interval_minutes: minutes(&lookup, INTERVAL_VAR, DEFAULT_INTERVAL_MINUTES)?,
            check_for_minutes: minutes(&lookup, CHECK_FOR_VAR, DEFAULT_CHECK_FOR_MINUTES)?,
        };

        let base_url = optional(&lookup, BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: BASE_URL_VAR,
                reason: format!("'{base_url}' is not an http(s) URL"),
            });
        }

        let recv_window = optional(&lookup, RECV_WINDOW_VAR)
            .map(|raw| parse_recv_window(&raw))
            .transpose()?;

        let config = Self {
            credentials,
            target,
            schedule,
            base_url,
            recv_window,
        };

        info!(
            coin = %config.target.coin,
            network = %config.target.network,
            address = %config.target.address,
            memo = config.target.memo.is_some(),
            interval_minutes = config.schedule.interval_minutes,
            check_for_minutes = config.schedule.check_for_minutes,
            "configuration loaded"
        );

        Ok(config)
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or(ConfigError::Missing(name))
}

/// Trimmed value; blank counts as unset.
fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn minutes<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = optional(lookup, name) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            reason: "must be at least 1 minute".into(),
        }),
        Ok(value) if value > MAX_CADENCE_MINUTES => Err(ConfigError::Invalid {
            name,
            reason: format!("must be at most {MAX_CADENCE_MINUTES} minutes"),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

fn parse_recv_window(raw: &str) -> Result<u64, ConfigError> {
    let value = raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
        name: RECV_WINDOW_VAR,
        reason: format!("'{raw}': {e}"),
    })?;
    if value == 0 || value > MAX_RECV_WINDOW {
        return Err(ConfigError::Invalid {
            name: RECV_WINDOW_VAR,
            reason: format!("must be between 1 and {MAX_RECV_WINDOW} ms"),
        });
    }
    Ok(value)
}

// =============================================================================
// Tests
// =============================================================================
