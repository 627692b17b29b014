//! Inbound provisioning module.
//!
//! Turns a claimed order into a stored inbound bound to a unique port.

mod ports;
pub mod protocols;
mod provisioner;
mod types;

pub use ports::PortAllocator;
pub use protocols::{ProtocolDefinition, ProtocolRegistry};
pub use provisioner::Provisioner;
pub use types::Inbound;
