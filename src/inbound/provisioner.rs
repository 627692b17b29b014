//! Order-gated inbound creation.
//!
//! The inbound insert and the order's `paid -> used` transition commit in one
//! transaction, so an order is never consumed without its inbound and an
//! inbound is never stored without consuming its order.

use sqlx::{Sqlite, Transaction};
use tracing::{debug, error, info, warn};

use crate::config::ProvisioningConfig;
use crate::error::{GateError, GateResult, ProvisionErrorKind};
use crate::inbound::ports::PortAllocator;
use crate::inbound::protocols::ProtocolRegistry;
use crate::inbound::types::{
    fetch_inbound, Inbound, InboundDraft, DEFAULT_SNIFFING, DEFAULT_STREAM_SETTINGS,
};
use crate::orders::{OrderLedger, OrderStatus};
use crate::protocol::CreateInboundRequest;
use crate::store::{is_unique_violation, Database};

/// Creates inbounds against paid orders.
pub struct Provisioner {
    db: Database,
    ledger: OrderLedger,
    ports: PortAllocator,
    protocols: ProtocolRegistry,
    port_low: u16,
    port_high: u16,
    max_port_retries: u32,
}

/// Outcome of one insert-and-commit attempt.
enum Attempt {
    Created(i64),
    PortTaken,
    OrderGone,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// `order-` followed by the last four characters of the order id.
fn default_remark(order_id: &str) -> String {
    let tail: Vec<char> = order_id.chars().rev().take(4).collect();
    let tail: String = tail.into_iter().rev().collect();
    format!("order-{}", tail)
}

async fn rollback(tx: Transaction<'_, Sqlite>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Rollback failed");
    }
}

fn persist_failure(order_id: &str, err: impl std::fmt::Display) -> GateError {
    error!(order_id = %order_id, error = %err, "Failed to persist inbound");
    ProvisionErrorKind::PersistFailure {
        message: err.to_string(),
    }
    .into()
}

impl Provisioner {
    pub fn new(
        db: Database,
        ledger: OrderLedger,
        protocols: ProtocolRegistry,
        config: &ProvisioningConfig,
    ) -> Self {
        Self {
            ports: PortAllocator::new(db.clone()),
            db,
            ledger,
            protocols,
            port_low: config.port_range_start,
            port_high: config.port_range_end,
            max_port_retries: config.max_port_retries,
        }
    }

    /// Fetch a stored inbound.
    pub async fn get_inbound(&self, id: i64) -> GateResult<Option<Inbound>> {
        let mut conn = self.db.pool().acquire().await?;
        Ok(fetch_inbound(&mut conn, id).await?)
    }

    /// The inbound already created for this order and user, if any.
    async fn existing_inbound(&self, order_id: &str, user_id: &str) -> GateResult<Option<Inbound>> {
        let Some(order) = self.ledger.get(order_id).await? else {
            return Ok(None);
        };
        if order.status != OrderStatus::Used || order.user_id != user_id || order.inbound_id <= 0 {
            return Ok(None);
        }
        self.get_inbound(order.inbound_id).await
    }

    /// Create the inbound for a paid order.
    ///
    /// Retrying a request whose order was already consumed by the same user
    /// returns the inbound created the first time.
    pub async fn create_inbound(&self, request: &CreateInboundRequest) -> GateResult<Inbound> {
        let order_id = request.order_id.as_str();
        let user_id = request.user_id.as_str();

        let protocol = self.protocols.get(&request.protocol).ok_or_else(|| {
            ProvisionErrorKind::UnsupportedProtocol {
                protocol: request.protocol.clone(),
            }
        })?;

        if let Some(inbound) = self.existing_inbound(order_id, user_id).await? {
            info!(order_id = %order_id, inbound_id = inbound.id, "Returning existing inbound");
            return Ok(inbound);
        }

        self.ledger.claim(order_id, user_id).await?;

        let explicit_port = match request.port.filter(|port| *port != 0) {
            Some(port) => {
                let port = u16::try_from(port)
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or(ProvisionErrorKind::InvalidPort { port })?;
                if self.ports.is_taken(port).await? {
                    return self
                        .settle_port_failure(order_id, user_id, ProvisionErrorKind::PortConflict { port })
                        .await;
                }
                Some(port)
            }
            None => None,
        };

        let draft = InboundDraft {
            total: request.total.unwrap_or(0),
            remark: non_empty(&request.remark)
                .map(str::to_string)
                .unwrap_or_else(|| default_remark(order_id)),
            expiry_time: request.expiry_time.unwrap_or(0),
            listen: request.listen.clone().unwrap_or_default(),
            protocol: protocol.name().to_string(),
            settings: non_empty(&request.settings)
                .map(str::to_string)
                .unwrap_or_else(|| protocol.default_settings().to_string()),
            stream_settings: non_empty(&request.stream_settings)
                .unwrap_or(DEFAULT_STREAM_SETTINGS)
                .to_string(),
            sniffing: non_empty(&request.sniffing)
                .unwrap_or(DEFAULT_SNIFFING)
                .to_string(),
        };

        let mut port = match explicit_port {
            Some(port) => port,
            None => match self.ports.reserve(self.port_low, self.port_high).await {
                Ok(port) => port,
                Err(GateError::Provision { kind }) => {
                    return self.settle_port_failure(order_id, user_id, kind).await;
                }
                Err(e) => return Err(e),
            },
        };
        let mut retries = 0;

        loop {
            match self.attempt(order_id, &draft, port).await? {
                Attempt::Created(id) => {
                    let inbound = self
                        .get_inbound(id)
                        .await?
                        .ok_or_else(|| persist_failure(order_id, "inbound missing after commit"))?;
                    info!(
                        order_id = %order_id,
                        user_id = %user_id,
                        inbound_id = inbound.id,
                        port = inbound.port,
                        protocol = %inbound.protocol,
                        "Inbound created"
                    );
                    return Ok(inbound);
                }
                Attempt::PortTaken => {
                    if explicit_port.is_some() {
                        return self
                            .settle_port_failure(order_id, user_id, ProvisionErrorKind::PortConflict { port })
                            .await;
                    }
                    retries += 1;
                    if retries > self.max_port_retries || port == self.port_high {
                        warn!(order_id = %order_id, retries, "Giving up on port allocation");
                        let exhausted = ProvisionErrorKind::PortExhausted {
                            low: self.port_low,
                            high: self.port_high,
                        };
                        return self.settle_port_failure(order_id, user_id, exhausted).await;
                    }
                    debug!(port, "Port taken at insert, trying the next one");
                    port = match self
                        .ports
                        .reserve_from(port + 1, self.port_low, self.port_high)
                        .await
                    {
                        Ok(port) => port,
                        Err(GateError::Provision { kind }) => {
                            return self.settle_port_failure(order_id, user_id, kind).await;
                        }
                        Err(e) => return Err(e),
                    };
                }
                Attempt::OrderGone => {
                    // Lost the commit to a concurrent request for the same order.
                    if let Some(inbound) = self.existing_inbound(order_id, user_id).await? {
                        info!(order_id = %order_id, inbound_id = inbound.id, "Order consumed concurrently");
                        return Ok(inbound);
                    }
                    self.ledger.claim(order_id, user_id).await?;
                    return Err(persist_failure(order_id, "order changed state during commit"));
                }
            }
        }
    }

    /// Decide a port failure that may stem from a concurrent request for the
    /// same order.
    ///
    /// If that request already consumed the order, its inbound is the answer.
    /// A state change that makes the order unclaimable surfaces as the order
    /// error; only a still-claimable order reports `kind`.
    async fn settle_port_failure(
        &self,
        order_id: &str,
        user_id: &str,
        kind: ProvisionErrorKind,
    ) -> GateResult<Inbound> {
        if let Some(inbound) = self.existing_inbound(order_id, user_id).await? {
            info!(order_id = %order_id, inbound_id = inbound.id, "Order consumed concurrently");
            return Ok(inbound);
        }
        self.ledger.claim(order_id, user_id).await?;
        Err(kind.into())
    }

    /// Insert the draft on `port` and consume the order, all or nothing.
    async fn attempt(&self, order_id: &str, draft: &InboundDraft, port: u16) -> GateResult<Attempt> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| persist_failure(order_id, e))?;

        let inbound_id = match draft.insert(&mut *tx, port).await {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => {
                rollback(tx).await;
                return Ok(Attempt::PortTaken);
            }
            Err(e) => {
                rollback(tx).await;
                return Err(persist_failure(order_id, e));
            }
        };

        match OrderLedger::commit_used(&mut *tx, order_id, inbound_id).await {
            Ok(true) => {}
            Ok(false) => {
                rollback(tx).await;
                return Ok(Attempt::OrderGone);
            }
            Err(e) => {
                rollback(tx).await;
                return Err(persist_failure(order_id, e));
            }
        }

        tx.commit().await.map_err(|e| persist_failure(order_id, e))?;
        Ok(Attempt::Created(inbound_id))
    }
}
