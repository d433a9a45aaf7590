// =============================================================================
// Withdraw Decision — sweep the funding balance of one coin when non-zero
// =============================================================================
//
// One call to `attempt_withdraw` is one cycle: read the funding wallet, look
// up the target coin, and if its free balance is anything other than zero
// submit a withdrawal for the full amount. Nothing is raised out of a cycle;
// every failure comes back as a typed outcome so the scheduler can simply try
// again later.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::binance::signer::Payload;
use crate::types::{Endpoint, ExchangeError, FundingAsset, WithdrawOutcome, WithdrawalTarget};

/// The two exchange calls a withdraw cycle needs.
#[async_trait]
pub trait FundingApi: Send + Sync {
    /// Raw funding-wallet balance list.
    async fn funding_assets(&self) -> Result<serde_json::Value>;

    /// Submit a withdrawal; returns the raw response body.
    async fn apply_withdrawal(&self, payload: &Payload) -> Result<serde_json::Value>;
}

#[async_trait]
impl<T: FundingApi + ?Sized> FundingApi for Arc<T> {
    async fn funding_assets(&self) -> Result<serde_json::Value> {
        (**self).funding_assets().await
    }

    async fn apply_withdrawal(&self, payload: &Payload) -> Result<serde_json::Value> {
        (**self).apply_withdrawal(payload).await
    }
}

/// Free balance of `coin` (case-sensitive match), as `(parsed, raw)`.
/// An absent coin counts as zero.
pub fn free_balance(assets: &[FundingAsset], coin: &str) -> Result<(f64, String)> {
    let Some(asset) = assets.iter().find(|a| a.asset == coin) else {
        return Ok((0.0, "0".to_string()));
    };

    let raw = asset.free.trim();
    let amount: f64 = raw
        .parse()
        .with_context(|| format!("failed to parse free balance '{raw}' for {coin}"))?;
    if !amount.is_finite() {
        anyhow::bail!("free balance for {coin} is not a finite number: '{raw}'");
    }
    Ok((amount, raw.to_string()))
}

// -----------------------------------------------------------------------------
// Withdrawer
// -----------------------------------------------------------------------------

pub struct Withdrawer<E> {
    api: E,
    target: WithdrawalTarget,
}

impl<E: FundingApi> Withdrawer<E> {
    pub fn new(api: E, target: WithdrawalTarget) -> Self {
        Self { api, target }
    }

    pub fn target(&self) -> &WithdrawalTarget {
        &self.target
    }

    /// Withdrawal parameters for `amount`. `addressTag` is only present when
    /// a memo is configured.
    pub fn withdrawal_payload(&self, amount: &str) -> Payload {
        let mut payload = Payload::new()
            .param("coin", &self.target.coin)
            .param("amount", amount)
            .param("network", &self.target.network)
            .param("address", &self.target.address);
        if let Some(memo) = &self.target.memo {
            payload.push("addressTag", memo);
        }
        payload
    }

    /// Run one balance-check-and-withdraw cycle. Never fails.
    pub async fn attempt_withdraw(&self) -> WithdrawOutcome {
        match self.try_withdraw().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(coin = %self.target.coin, error = %format!("{e:#}"), "withdraw cycle failed");
                WithdrawOutcome::TransientError(format!("{e:#}"))
            }
        }
    }

    async fn try_withdraw(&self) -> Result<WithdrawOutcome> {
        let coin = self.target.coin.as_str();

        let body = self
            .api
            .funding_assets()
            .await
            .context("funding asset request failed")?;
        if let Some(err) = ExchangeError::from_body(Endpoint::FundingAssets, &body) {
            return Ok(self.rejected(err));
        }

        let assets: Vec<FundingAsset> =
            serde_json::from_value(body).context("unexpected funding asset response")?;
        let (amount, raw_amount) = free_balance(&assets, coin)?;

        if amount == 0.0 {
            info!(coin, "coin balance is zero");
            return Ok(WithdrawOutcome::NoBalance);
        }

        info!(coin, amount = %raw_amount, network = %self.target.network, "balance found, submitting withdrawal");
        let payload = self.withdrawal_payload(&raw_amount);
        let response = self
            .api
            .apply_withdrawal(&payload)
            .await
            .context("withdrawal request failed")?;

        if let Some(err) = ExchangeError::from_body(Endpoint::Withdraw, &response) {
            return Ok(self.rejected(err));
        }

        info!(coin, response = %response, "withdrawal submitted");
        Ok(WithdrawOutcome::Withdrawn(response))
    }

    fn rejected(&self, err: ExchangeError) -> WithdrawOutcome {
        if err.is_transient() {
            warn!(coin = %self.target.coin, endpoint = %err.endpoint, code = err.code, msg = %err.msg, "exchange reported a retryable error");
            WithdrawOutcome::TransientError(err.to_string())
        } else {
            error!(coin = %self.target.coin, endpoint = %err.endpoint, code = err.code, msg = %err.msg, "exchange rejected request");
            WithdrawOutcome::PermanentError(err)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
