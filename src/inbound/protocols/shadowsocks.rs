//! Shadowsocks protocol definition.

use super::traits::{generate_password, ProtocolDefinition};

/// Cipher used for generated shadowsocks inbounds.
pub const DEFAULT_METHOD: &str = "aes-256-gcm";

/// Shadowsocks with a single shared password.
pub struct ShadowsocksProtocol;

impl ProtocolDefinition for ShadowsocksProtocol {
    fn name(&self) -> &'static str {
        "shadowsocks"
    }

    fn display_name(&self) -> &'static str {
        "Shadowsocks"
    }

    fn default_settings(&self) -> serde_json::Value {
        serde_json::json!({
            "method": DEFAULT_METHOD,
            "password": generate_password(),
        })
    }
}
