//! Port allocation for new inbounds.

use tracing::debug;

use crate::error::{GateResult, ProvisionErrorKind};
use crate::store::Database;

/// Finds ports not bound by any stored inbound.
///
/// The scan is advisory: two callers can be handed the same port. The
/// `UNIQUE(port)` constraint decides, and the loser moves on with
/// [`reserve_from`](Self::reserve_from).
#[derive(Clone)]
pub struct PortAllocator {
    db: Database,
}

impl PortAllocator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether a stored inbound already binds `port`.
    pub async fn is_taken(&self, port: u16) -> GateResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM inbounds WHERE port = ? LIMIT 1")
            .bind(i64::from(port))
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Lowest free port in `low..=high`.
    pub async fn reserve(&self, low: u16, high: u16) -> GateResult<u16> {
        self.scan(low, high, low).await
    }

    /// Lowest free port in `start..=high`, reported against the full range `low..=high`.
    pub async fn reserve_from(&self, start: u16, low: u16, high: u16) -> GateResult<u16> {
        self.scan(start, high, low).await
    }

    async fn scan(&self, start: u16, high: u16, low: u16) -> GateResult<u16> {
        for port in start..=high {
            if !self.is_taken(port).await? {
                debug!(port, "Port allocated");
                return Ok(port);
            }
        }
        Err(ProvisionErrorKind::PortExhausted { low, high }.into())
    }
}
