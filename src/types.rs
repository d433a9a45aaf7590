// =============================================================================
// Shared types used across the funding sweeper
// =============================================================================

use serde::{Deserialize, Serialize};

/// API credentials. The key travels as a header; the secret only keys the
/// HMAC and is never sent.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Where the swept balance goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalTarget {
    pub coin: String,
    pub network: String,
    pub address: String,
    /// Destination tag; `None` when the network does not need one.
    pub memo: Option<String>,
}

fn zero() -> String {
    "0".to_string()
}

/// One row of the funding-wallet balance list, as returned by the exchange.
/// Amounts stay as the exchange's decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingAsset {
    pub asset: String,
    #[serde(default = "zero")]
    pub free: String,
    #[serde(default = "zero")]
    pub locked: String,
    #[serde(default = "zero")]
    pub freeze: String,
    #[serde(default = "zero")]
    pub withdrawing: String,
    #[serde(default = "zero")]
    pub btc_valuation: String,
}

/// Logical exchange endpoints the sweeper talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    FundingAssets,
    Withdraw,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FundingAssets => write!(f, "funding-assets"),
            Self::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Error codes the exchange uses for conditions that clear up on their own
/// (disconnects, overload, rate limiting, timestamp outside recvWindow).
const TRANSIENT_CODES: &[i64] = &[-1000, -1001, -1003, -1006, -1007, -1008, -1021];

/// An error reported inside an otherwise well-formed response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeError {
    pub endpoint: Endpoint,
    pub code: i64,
    pub msg: String,
}

impl ExchangeError {
    /// Recognise the exchange's `{"code": <negative>, "msg": "..."}` body.
    pub fn from_body(endpoint: Endpoint, body: &serde_json::Value) -> Option<Self> {
        let code = body.get("code")?.as_i64()?;
        if code >= 0 {
            return None;
        }
        let msg = body
            .get("msg")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        Some(Self {
            endpoint,
            code,
            msg,
        })
    }

    pub fn is_transient(&self) -> bool {
        TRANSIENT_CODES.contains(&self.code)
    }
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rejected ({}): {}", self.endpoint, self.code, self.msg)
    }
}

/// Result of one balance-check-and-withdraw cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawOutcome {
    /// The withdrawal request was accepted; carries the exchange response.
    Withdrawn(serde_json::Value),
    /// Free balance was zero (or the coin was absent); nothing sent.
    NoBalance,
    /// Network, decoding or retryable exchange failure.
    TransientError(String),
    /// The exchange rejected the request with a non-retryable code.
    PermanentError(ExchangeError),
}

impl WithdrawOutcome {
    pub fn is_withdrawn(&self) -> bool {
        matches!(self, Self::Withdrawn(_))
    }

    /// Whether a withdrawal request actually reached the exchange and got an
    /// answer, successful or not. Such a cycle is over.
    pub fn reached_withdraw_endpoint(&self) -> bool {
        match self {
            Self::Withdrawn(_) => true,
            Self::PermanentError(e) => e.endpoint == Endpoint::Withdraw,
            Self::NoBalance | Self::TransientError(_) => false,
        }
    }
}

impl std::fmt::Display for WithdrawOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Withdrawn(v) => write!(f, "Withdrawn({v})"),
            Self::NoBalance => write!(f, "NoBalance"),
            Self::TransientError(reason) => write!(f, "TransientError({reason})"),
            Self::PermanentError(err) => write!(f, "PermanentError({err})"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
