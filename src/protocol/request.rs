//! Request types for the gate API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GateResult, ProtocolErrorKind};

/// Public API key identifying the credential.
pub const HEADER_API_KEY: &str = "x-api-key";
/// Unix timestamp in seconds, decimal.
pub const HEADER_TIMESTAMP: &str = "x-timestamp";
/// Random per-request value.
pub const HEADER_NONCE: &str = "x-nonce";
/// Lowercase hex HMAC-SHA256 of `timestamp ‖ nonce ‖ body`.
pub const HEADER_SIGNATURE: &str = "x-signature";
/// Set on every response.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// A request body with required fields that must be non-empty.
pub trait RequestBody: DeserializeOwned {
    /// Return the first missing required field, if any.
    fn missing_field(&self) -> Option<&'static str>;
}

/// Parse a JSON request body and check its required fields.
pub fn parse_body<T: RequestBody>(body: &[u8]) -> GateResult<T> {
    let parsed: T = serde_json::from_slice(body).map_err(|e| ProtocolErrorKind::MalformedBody {
        message: e.to_string(),
    })?;

    if let Some(field) = parsed.missing_field() {
        return Err(ProtocolErrorKind::MissingField {
            field: field.to_string(),
        }
        .into());
    }

    Ok(parsed)
}

/// Body of `POST {prefix}/inbound/create`.
///
/// `settings`, `streamSettings` and `sniffing` are JSON documents carried as
/// strings; they are stored as given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInboundRequest {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub protocol: String,
    /// Requested port. Absent or zero means allocate one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    /// Millisecond epoch, zero for never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<i64>,
    /// Traffic cap in bytes, zero for unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniffing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

impl CreateInboundRequest {
    pub fn new(
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            user_id: user_id.into(),
            protocol: protocol.into(),
            ..Default::default()
        }
    }

    /// Request a specific port (builder pattern).
    pub fn with_port(mut self, port: i64) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the remark (builder pattern).
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    /// Override the protocol settings document (builder pattern).
    pub fn with_settings(mut self, settings: impl Into<String>) -> Self {
        self.settings = Some(settings.into());
        self
    }
}

impl RequestBody for CreateInboundRequest {
    fn missing_field(&self) -> Option<&'static str> {
        if self.order_id.trim().is_empty() {
            Some("orderId")
        } else if self.user_id.trim().is_empty() {
            Some("userId")
        } else if self.protocol.trim().is_empty() {
            Some("protocol")
        } else {
            None
        }
    }
}

/// Body of `POST {prefix}/order/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusRequest {
    #[serde(default)]
    pub order_id: String,
}

impl OrderStatusRequest {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
        }
    }
}

impl RequestBody for OrderStatusRequest {
    fn missing_field(&self) -> Option<&'static str> {
        if self.order_id.trim().is_empty() {
            Some("orderId")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;

    #[test]
    fn test_parse_create_request() {
        let body = br#"{"orderId":"O1","userId":"U1","protocol":"vless","port":20001,"expiryTime":0}"#;
        let request: CreateInboundRequest = parse_body(body).unwrap();

        assert_eq!(request.order_id, "O1");
        assert_eq!(request.user_id, "U1");
        assert_eq!(request.protocol, "vless");
        assert_eq!(request.port, Some(20001));
        assert_eq!(request.expiry_time, Some(0));
        assert!(request.settings.is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let result: GateResult<CreateInboundRequest> =
            parse_body(br#"{"orderId":"O1","protocol":"vless"}"#);
        match result {
            Err(GateError::Protocol {
                kind: ProtocolErrorKind::MissingField { field },
            }) => assert_eq!(field, "userId"),
            other => panic!("unexpected result: {:?}", other),
        }

        let result: GateResult<OrderStatusRequest> = parse_body(br#"{"orderId":"  "}"#);
        assert!(matches!(
            result,
            Err(GateError::Protocol {
                kind: ProtocolErrorKind::MissingField { .. }
            })
        ));
    }

    #[test]
    fn test_malformed_body() {
        let result: GateResult<OrderStatusRequest> = parse_body(b"{not json");
        assert!(matches!(
            result,
            Err(GateError::Protocol {
                kind: ProtocolErrorKind::MalformedBody { .. }
            })
        ));

        let result: GateResult<CreateInboundRequest> =
            parse_body(br#"{"orderId":"O1","userId":"U1","protocol":"vless","port":"high"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_skips_unset_optionals() {
        let request = CreateInboundRequest::new("O1", "U1", "trojan").with_port(443);
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"orderId\":\"O1\""));
        assert!(json.contains("\"port\":443"));
        assert!(!json.contains("streamSettings"));
    }
}
