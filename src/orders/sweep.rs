//! Background expiry of overdue orders.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock;
use crate::orders::OrderLedger;

/// Start a background task that periodically expires overdue orders.
///
/// Failures are logged and the task keeps running.
pub fn start_sweep_task(ledger: OrderLedger, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        loop {
            interval_timer.tick().await;
            match ledger.expire_overdue(clock::now_millis()).await {
                Ok(count) => debug!(count, "Order sweep finished"),
                Err(e) => warn!(error = %e, "Order sweep failed"),
            }
        }
    })
}
