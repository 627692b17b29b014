//! Order ledger module.
//!
//! Tracks paid orders and the single inbound each one may be exchanged for.

mod ledger;
mod sweep;
mod types;

pub use ledger::OrderLedger;
pub use sweep::start_sweep_task;
pub use types::{Order, OrderStatus};
