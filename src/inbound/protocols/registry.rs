//! Protocol registry.
//!
//! Central registry for all provisionable protocols.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::shadowsocks::ShadowsocksProtocol;
use super::traits::ProtocolDefinition;
use super::trojan::TrojanProtocol;
use super::vless::VlessProtocol;
use super::vmess::VmessProtocol;

/// Registry of all supported protocols.
pub struct ProtocolRegistry {
    protocols: HashMap<&'static str, Arc<dyn ProtocolDefinition>>,
}

impl ProtocolRegistry {
    /// Create a new registry with all built-in protocols.
    pub fn new() -> Self {
        let mut registry = Self {
            protocols: HashMap::new(),
        };

        registry.register(Arc::new(VmessProtocol));
        registry.register(Arc::new(VlessProtocol));
        registry.register(Arc::new(TrojanProtocol));
        registry.register(Arc::new(ShadowsocksProtocol));

        info!(
            count = registry.protocols.len(),
            "Protocol registry initialized"
        );

        registry
    }

    /// Register a protocol definition.
    pub fn register(&mut self, protocol: Arc<dyn ProtocolDefinition>) {
        self.protocols.insert(protocol.name(), protocol);
    }

    /// Get a protocol definition by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProtocolDefinition>> {
        self.protocols.get(name).cloned()
    }

    /// List all registered protocol names.
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.protocols.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
