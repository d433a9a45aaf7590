//! Scripted in-memory exchange used by the withdraw and scheduler tests.

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::binance::signer::Payload;
use crate::types::WithdrawalTarget;
use crate::withdraw::FundingApi;

pub(crate) fn target(memo: Option<&str>) -> WithdrawalTarget {
    WithdrawalTarget {
        coin: "XYZ".into(),
        network: "BSC".into(),
        address: "0xabc".into(),
        memo: memo.map(str::to_string),
    }
}

/// Funding-asset response body with one row per `(asset, free)`.
pub(crate) fn balances(rows: &[(&str, &str)]) -> Value {
    Value::Array(
        rows.iter()
            .map(|(asset, free)| json!({ "asset": asset, "free": free, "locked": "0" }))
            .collect(),
    )
}

/// Replays queued funding responses in order; once the queue runs dry every
/// call reports an empty wallet. Withdrawal calls replay their own queue. Records every withdrawal payload and the
/// (virtual) time of every balance check.
pub(crate) struct ScriptedApi {
    funding: Mutex<VecDeque<Result<Value, String>>>,
    withdraw_response: Value,
    withdraw_script: Mutex<VecDeque<Result<Value, String>>>,
    withdrawals: Mutex<Vec<Payload>>,
    checks: Mutex<Vec<Instant>>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self {
            funding: Mutex::new(VecDeque::new()),
            withdraw_response: json!({ "id": "withdraw-1" }),
            withdraw_script: Mutex::new(VecDeque::new()),
            withdrawals: Mutex::new(Vec::new()),
            checks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_funding(self, body: Value) -> Self {
        self.funding.lock().push_back(Ok(body));
        self
    }

    pub(crate) fn with_failure(self, reason: &str) -> Self {
        self.funding.lock().push_back(Err(reason.to_string()));
        self
    }

    pub(crate) fn with_withdraw_response(mut self, body: Value) -> Self {
        self.withdraw_response = body;
        self
    }

    /// Fail the next withdrawal call with a transport-style error; later
    /// calls fall back to the configured response.
    pub(crate) fn with_withdraw_failure(self, reason: &str) -> Self {
        self.withdraw_script.lock().push_back(Err(reason.to_string()));
        self
    }

    pub(crate) fn withdrawals(&self) -> Vec<Payload> {
        self.withdrawals.lock().clone()
    }

    pub(crate) fn check_times(&self) -> Vec<Instant> {
        self.checks.lock().clone()
    }
}

#[async_trait]
impl FundingApi for ScriptedApi {
    async fn funding_assets(&self) -> Result<Value> {
        self.checks.lock().push(Instant::now());
        match self.funding.lock().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(anyhow::anyhow!(reason)),
            None => Ok(json!([])),
        }
    }

    async fn apply_withdrawal(&self, payload: &Payload) -> Result<Value> {
        self.withdrawals.lock().push(payload.clone());
        match self.withdraw_script.lock().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(anyhow::anyhow!(reason)),
            None => Ok(self.withdraw_response.clone()),
        }
    }
}
