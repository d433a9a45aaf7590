// =============================================================================
// Request Signer — query encoding, timestamps and HMAC-SHA256 signatures
// =============================================================================
//
// SECURITY: The secret is only ever used as the HMAC key. It is never placed
// in a query string, a header, or a log line.
// =============================================================================

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

// -----------------------------------------------------------------------------
// Payload
// -----------------------------------------------------------------------------

/// Ordered request parameters.
///
/// Keys may repeat; each occurrence is encoded as its own `key=value` pair,
/// so `a=[1, 2]` becomes `a=1&a=2` rather than a serialised list literal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pairs: Vec<(String, String)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Payload::push`].
    pub fn param(mut self, key: &str, value: impl Display) -> Self {
        self.push(key, value);
        self
    }

    /// Append one pair per element of `values`, all under `key`.
    #[cfg(test)]
    pub fn params<I, T>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        for value in values {
            self.push(key, value);
        }
        self
    }

    pub fn push(&mut self, key: &str, value: impl Display) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    /// First value stored under `key`.
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `application/x-www-form-urlencoded` rendering in insertion order.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

// -----------------------------------------------------------------------------
// Timestamp + query construction
// -----------------------------------------------------------------------------

/// Current UNIX timestamp in milliseconds.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Build the string that gets signed: the encoded payload followed by the
/// timestamp (and the recv-window, when one is configured).
///
/// An empty payload yields exactly `timestamp=<ts>`.
pub fn signed_query(payload: &Payload, timestamp: u64, recv_window: Option<u64>) -> String {
    let mut query = if payload.is_empty() {
        format!("timestamp={timestamp}")
    } else {
        format!("{}&timestamp={timestamp}", payload.encode())
    };
    if let Some(window) = recv_window {
        query.push_str(&format!("&recvWindow={window}"));
    }
    query
}

// -----------------------------------------------------------------------------
// Signer
// -----------------------------------------------------------------------------

/// HMAC-SHA256 signer keyed by the API secret.
#[derive(Clone)]
pub struct RequestSigner {
    secret: String,
}

impl RequestSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Lowercase hex HMAC-SHA256 of the exact bytes of `query`.
    pub fn sign(&self, query: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_matches_published_test_vector() {
        let signer = RequestSigner::new(
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        );
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            signer.sign(query),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn sign_is_deterministic() {
        let signer = RequestSigner::new("secret");
        assert_eq!(signer.sign("timestamp=1"), signer.sign("timestamp=1"));
    }

    #[test]
    fn sign_differs_for_different_queries() {
        let signer = RequestSigner::new("secret");
        assert_ne!(signer.sign("timestamp=1"), signer.sign("timestamp=2"));
    }

    #[test]
    fn sign_differs_for_different_secrets() {
        let a = RequestSigner::new("secret-a");
        let b = RequestSigner::new("secret-b");
        assert_ne!(a.sign("timestamp=1"), b.sign("timestamp=1"));
    }

    #[test]
    fn signature_is_lowercase_hex_sha256() {
        let sig = RequestSigner::new("k").sign("m");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn debug_redacts_secret() {
        let out = format!("{:?}", RequestSigner::new("super-secret"));
        assert!(!out.contains("super-secret"));
    }

    #[test]
    fn encode_preserves_insertion_order() {
        let payload = Payload::new()
            .param("coin", "XYZ")
            .param("amount", "5.0")
            .param("network", "BSC");
        assert_eq!(payload.encode(), "coin=XYZ&amount=5.0&network=BSC");
    }

    #[test]
    fn encode_repeats_keys_for_lists() {
        let payload = Payload::new().params("a", [1, 2]);
        assert_eq!(payload.encode(), "a=1&a=2");
    }

    #[test]
    fn encode_escapes_special_characters() {
        let payload = Payload::new().param("memo", "a b&c=d/é");
        assert_eq!(payload.encode(), "memo=a+b%26c%3Dd%2F%C3%A9");
    }

    #[test]
    fn signed_query_for_empty_payload_is_only_timestamp() {
        assert_eq!(signed_query(&Payload::new(), 1234, None), "timestamp=1234");
    }

    #[test]
    fn signed_query_appends_timestamp_after_payload() {
        let payload = Payload::new().param("coin", "XYZ");
        assert_eq!(
            signed_query(&payload, 1234, None),
            "coin=XYZ&timestamp=1234"
        );
    }

    #[test]
    fn signed_query_appends_recv_window_when_configured() {
        assert_eq!(
            signed_query(&Payload::new(), 1234, Some(5000)),
            "timestamp=1234&recvWindow=5000"
        );
    }

    #[test]
    fn get_returns_first_value_for_key() {
        let payload = Payload::new().params("a", ["x", "y"]);
        assert_eq!(payload.get("a"), Some("x"));
        assert!(!payload.contains("b"));
    }

    #[test]
    fn timestamp_is_after_2020() {
        assert!(timestamp_ms() > 1_577_836_800_000);
    }
}
