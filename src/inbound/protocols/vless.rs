//! VLESS protocol definition.

use uuid::Uuid;

use super::traits::ProtocolDefinition;

/// VLESS without flow control or decryption.
pub struct VlessProtocol;

impl ProtocolDefinition for VlessProtocol {
    fn name(&self) -> &'static str {
        "vless"
    }

    fn display_name(&self) -> &'static str {
        "VLESS"
    }

    fn default_settings(&self) -> serde_json::Value {
        serde_json::json!({
            "clients": [{"id": Uuid::new_v4().to_string(), "flow": ""}],
            "decryption": "none",
        })
    }
}
