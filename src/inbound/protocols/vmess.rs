//! VMess protocol definition.

use uuid::Uuid;

use super::traits::ProtocolDefinition;

/// VMess with AEAD-only clients.
pub struct VmessProtocol;

impl ProtocolDefinition for VmessProtocol {
    fn name(&self) -> &'static str {
        "vmess"
    }

    fn display_name(&self) -> &'static str {
        "VMess"
    }

    fn default_settings(&self) -> serde_json::Value {
        serde_json::json!({
            "clients": [{"id": Uuid::new_v4().to_string(), "alterId": 0}],
            "disableInsecureEncryption": false,
        })
    }
}
