//! Protocol definitions module.
//!
//! ## Adding a New Protocol
//!
//! 1. Create a new file in this directory (e.g., `socks.rs`)
//! 2. Implement the `ProtocolDefinition` trait
//! 3. Register the protocol in `ProtocolRegistry::new()`

mod registry;
mod shadowsocks;
mod traits;
mod trojan;
mod vless;
mod vmess;

pub use registry::ProtocolRegistry;
pub use shadowsocks::ShadowsocksProtocol;
pub use traits::{generate_password, ProtocolDefinition};
pub use trojan::TrojanProtocol;
pub use vless::VlessProtocol;
pub use vmess::VmessProtocol;
