//! Protocol definition traits.
//!
//! Defines the interface for protocols an inbound can be provisioned with.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of generated trojan/shadowsocks passwords.
pub const PASSWORD_LEN: usize = 16;

/// Defines a provisionable proxy protocol.
///
/// Implementations describe the protocol and produce the settings document
/// used when a request does not supply one. The document is opaque to the
/// gate and stored as JSON text.
///
/// # Example
///
/// ```ignore
/// pub struct SocksProtocol;
///
/// impl ProtocolDefinition for SocksProtocol {
///     fn name(&self) -> &'static str { "socks" }
///     fn display_name(&self) -> &'static str { "SOCKS" }
///     fn default_settings(&self) -> serde_json::Value {
///         serde_json::json!({"auth": "noauth", "udp": false})
///     }
/// }
/// ```
pub trait ProtocolDefinition: Send + Sync {
    /// Protocol identifier as sent by clients (e.g., "vless").
    ///
    /// This should be unique across all registered protocols.
    fn name(&self) -> &'static str;

    /// Human-readable display name.
    fn display_name(&self) -> &'static str;

    /// Default settings document.
    ///
    /// Each call must produce fresh client credentials.
    fn default_settings(&self) -> serde_json::Value;
}

/// Generate a random alphanumeric password.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}
