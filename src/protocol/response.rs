//! Response types for the gate API.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GateError;
use crate::inbound::Inbound;
use crate::orders::{Order, OrderStatus};

/// The response envelope returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the request succeeded.
    pub success: bool,

    /// Human-readable outcome.
    pub msg: String,

    /// Response data on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Envelope {
    /// Create a success envelope.
    pub fn success(msg: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            msg: msg.into(),
            data: Some(data),
        }
    }

    /// Create a failure envelope with a message safe for clients.
    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
            data: None,
        }
    }

    /// Create a failure envelope from an error.
    ///
    /// Internal errors are reduced to a generic message; the full error is
    /// only logged.
    pub fn from_error(err: &GateError) -> Self {
        debug!(code = err.code(), error = %err, "Error response (sanitized for client)");
        Self::failure(err.client_message())
    }

    /// Decode the `data` payload.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.data
            .clone()
            .and_then(|data| serde_json::from_value(data).ok())
    }
}

/// `data` of a successful inbound creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInboundData {
    pub inbound: Inbound,
}

/// `data` of an order status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusData {
    pub order_id: String,
    pub status: OrderStatus,
    pub inbound_id: i64,
    pub paid_at: i64,
    pub used_at: i64,
}

impl From<&Order> for OrderStatusData {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
            inbound_id: order.inbound_id,
            paid_at: order.paid_at,
            used_at: order.used_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthErrorKind, ProvisionErrorKind};

    #[test]
    fn test_success_envelope() {
        let envelope = Envelope::success("ok", serde_json::json!({"result": 1}));
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"msg\":\"ok\""));
        assert!(json.contains("\"data\""));
    }

    #[test]
    fn test_failure_envelope_omits_data() {
        let envelope = Envelope::failure("nope");
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(json.contains("\"success\":false"));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_from_error_messages() {
        let envelope = Envelope::from_error(&AuthErrorKind::Replayed.into());
        assert!(envelope.msg.contains("replay"));

        let envelope = Envelope::from_error(&GateError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(envelope.msg, "Internal server error");

        let envelope = Envelope::from_error(&ProvisionErrorKind::PortConflict { port: 443 }.into());
        assert!(envelope.msg.contains("443"));
    }

    #[test]
    fn test_order_status_data_field_names() {
        let data = OrderStatusData {
            order_id: "O1".to_string(),
            status: OrderStatus::Used,
            inbound_id: 7,
            paid_at: 1,
            used_at: 2,
        };
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["orderId"], "O1");
        assert_eq!(json["status"], "used");
        assert_eq!(json["inboundId"], 7);
        assert_eq!(json["paidAt"], 1);
        assert_eq!(json["usedAt"], 2);
    }
}
