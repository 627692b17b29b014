//! Trojan protocol definition.

use super::traits::{generate_password, ProtocolDefinition};

/// Trojan with a single password client.
pub struct TrojanProtocol;

impl ProtocolDefinition for TrojanProtocol {
    fn name(&self) -> &'static str {
        "trojan"
    }

    fn display_name(&self) -> &'static str {
        "Trojan"
    }

    fn default_settings(&self) -> serde_json::Value {
        serde_json::json!({
            "clients": [{"password": generate_password()}],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::protocols::traits::PASSWORD_LEN;

    #[test]
    fn test_trojan_default_settings() {
        let settings = TrojanProtocol.default_settings();
        let password = settings["clients"][0]["password"].as_str().unwrap();
        assert_eq!(password.len(), PASSWORD_LEN);
    }
}
