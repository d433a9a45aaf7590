// =============================================================================
// Binance REST API Client — HMAC-SHA256 signed and public requests
// =============================================================================
//
// SECURITY: The secret key is never logged or serialized. Every request
// carries X-MBX-APIKEY and a JSON content-type header; signed requests get a
// fresh timestamp and a signature computed over the exact query string.
//
// Responses are decoded and returned whatever the HTTP status: the exchange
// puts its error details in the body, and callers decide what they mean.
// =============================================================================

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::binance::signer::{self, Payload, RequestSigner};
use crate::types::Credentials;
use crate::withdraw::FundingApi;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

pub const FUNDING_ASSET_PATH: &str = "/sapi/v1/asset/get-funding-asset";
pub const WITHDRAW_APPLY_PATH: &str = "/sapi/v1/capital/withdraw/apply";
pub const SERVER_TIME_PATH: &str = "/api/v3/time";

const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// -----------------------------------------------------------------------------
// HTTP method
// -----------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

/// The verbs the exchange API accepts. Anything else is rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

/// Binance REST API client with HMAC-SHA256 request signing.
#[derive(Clone)]
pub struct BinanceClient {
    signer: RequestSigner,
    base_url: String,
    recv_window: Option<u64>,
    client: reqwest::Client,
}

impl BinanceClient {
    /// Create a new `BinanceClient`.
    ///
    /// # Arguments
    /// * `credentials` — API key (sent as a header) and secret (HMAC key only).
    /// * `base_url`    — REST root, e.g. [`DEFAULT_BASE_URL`].
    /// * `recv_window` — optional `recvWindow` appended to signed queries.
    pub fn new(
        credentials: &Credentials,
        base_url: impl Into<String>,
        recv_window: Option<u64>,
    ) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "X-MBX-APIKEY",
            HeaderValue::from_str(&credentials.api_key)
                .context("API key is not a valid header value")?,
        );
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            signer: RequestSigner::new(credentials.api_secret.clone()),
            base_url,
            recv_window,
            client,
        })
    }

    // -------------------------------------------------------------------------
    // URL construction
    // -------------------------------------------------------------------------

    /// Full URL of a signed request made at `timestamp`.
    pub fn signed_url(&self, path: &str, payload: &Payload, timestamp: u64) -> String {
        let query = signer::signed_query(payload, timestamp, self.recv_window);
        let signature = self.signer.sign(&query);
        format!("{}{}?{}&signature={}", self.base_url, path, query, signature)
    }

    /// Full URL of an unsigned request.
    pub fn public_url(&self, path: &str, payload: &Payload) -> String {
        if payload.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, payload.encode())
        }
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Signed request. The timestamp is taken at call time.
    #[instrument(skip(self, payload), name = "binance::send_signed")]
    pub async fn send_signed(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &Payload,
    ) -> Result<serde_json::Value> {
        let url = self.signed_url(path, payload, signer::timestamp_ms());
        self.dispatch(method, &url, path).await
    }

    /// Unsigned GET request.
    #[instrument(skip(self, payload), name = "binance::send_public")]
    pub async fn send_public(&self, path: &str, payload: &Payload) -> Result<serde_json::Value> {
        let url = self.public_url(path, payload);
        self.dispatch(HttpMethod::Get, &url, path).await
    }

    /// GET /api/v3/time — server clock in milliseconds.
    pub async fn server_time(&self) -> Result<u64> {
        let body = self.send_public(SERVER_TIME_PATH, &Payload::new()).await?;
        body["serverTime"]
            .as_u64()
            .with_context(|| format!("server time response missing 'serverTime': {body}"))
    }

    /// Local clock minus exchange clock, in milliseconds.
    pub async fn clock_skew_ms(&self) -> Result<i64> {
        let server = self.server_time().await?;
        Ok(signer::timestamp_ms() as i64 - server as i64)
    }

    async fn dispatch(&self, method: HttpMethod, url: &str, path: &str) -> Result<serde_json::Value> {
        info!("{method} {url}");

        let request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Delete => self.client.delete(url),
        };

        let resp = request
            .send()
            .await
            .with_context(|| format!("{method} {path} request failed"))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {path} response"))?;

        if !status.is_success() {
            warn!(%status, path, body = %body, "non-success HTTP status");
        }

        Ok(body)
    }
}

#[async_trait]
impl FundingApi for BinanceClient {
    async fn funding_assets(&self) -> Result<serde_json::Value> {
        self.send_signed(HttpMethod::Post, FUNDING_ASSET_PATH, &Payload::new())
            .await
    }

    async fn apply_withdrawal(&self, payload: &Payload) -> Result<serde_json::Value> {
        self.send_signed(HttpMethod::Post, WITHDRAW_APPLY_PATH, payload)
            .await
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("recv_window", &self.recv_window)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
