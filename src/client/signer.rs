//! Authentication headers for a request body.

use reqwest::header::{HeaderMap, HeaderValue};
use uuid::Uuid;

use crate::auth::hmac;
use crate::clock;
use crate::error::{GateError, GateResult};
use crate::protocol::{HEADER_API_KEY, HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP};

/// The four headers that authenticate one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub api_key: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
}

impl SignedHeaders {
    /// Sign `body` now with a fresh random nonce.
    pub fn new(api_key: &str, secret: &[u8], body: &[u8]) -> Self {
        Self::at(api_key, secret, body, clock::now_secs(), Uuid::new_v4().to_string())
    }

    /// Sign `body` with an explicit timestamp and nonce.
    pub fn at(api_key: &str, secret: &[u8], body: &[u8], timestamp: i64, nonce: String) -> Self {
        let signature = hmac::sign(timestamp, &nonce, body, secret);
        Self {
            api_key: api_key.to_string(),
            timestamp,
            nonce,
            signature,
        }
    }

    pub fn to_header_map(&self) -> GateResult<HeaderMap> {
        let value = |raw: &str| {
            HeaderValue::from_str(raw).map_err(|e| GateError::Client {
                message: format!("Invalid header value: {}", e),
            })
        };

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_API_KEY, value(&self.api_key)?);
        headers.insert(HEADER_TIMESTAMP, value(&self.timestamp.to_string())?);
        headers.insert(HEADER_NONCE, value(&self.nonce)?);
        headers.insert(HEADER_SIGNATURE, value(&self.signature)?);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_verify() {
        let body = br#"{"orderId":"O1"}"#;
        let signed = SignedHeaders::new("xui_key", b"secret", body);

        assert!(hmac::verify(
            &signed.signature,
            signed.timestamp,
            &signed.nonce,
            body,
            b"secret"
        ));
        assert!(!hmac::verify(
            &signed.signature,
            signed.timestamp,
            &signed.nonce,
            br#"{"orderId":"O2"}"#,
            b"secret"
        ));
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let a = SignedHeaders::new("xui_key", b"secret", b"{}");
        let b = SignedHeaders::new("xui_key", b"secret", b"{}");
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_header_map() {
        let signed = SignedHeaders::at("xui_key", b"secret", b"{}", 1_700_000_000, "n1".to_string());
        let headers = signed.to_header_map().unwrap();

        assert_eq!(headers[HEADER_API_KEY], "xui_key");
        assert_eq!(headers[HEADER_TIMESTAMP], "1700000000");
        assert_eq!(headers[HEADER_NONCE], "n1");
        assert_eq!(headers[HEADER_SIGNATURE], signed.signature.as_str());
    }

    #[test]
    fn test_rejects_unencodable_nonce() {
        let signed = SignedHeaders::at("xui_key", b"secret", b"{}", 1, "bad\nnonce".to_string());
        assert!(matches!(signed.to_header_map(), Err(GateError::Client { .. })));
    }
}
