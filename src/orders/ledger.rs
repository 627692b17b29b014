//! Order state machine backed by the `orders` table.
//!
//! Every transition is a single conditional `UPDATE` whose `WHERE` clause
//! names the expected current state. The number of affected rows tells the
//! caller whether it won; there is no read-then-write window.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::clock;
use crate::error::{GateResult, OrderErrorKind};
use crate::orders::types::{Order, OrderRow, OrderStatus};
use crate::store::{is_unique_violation, Database};

const SELECT_COLUMNS: &str = "SELECT id, order_id, user_id, status, amount, paid_at, expires_at, \
                              inbound_id, created_at, used_at, remark FROM orders";

/// Reads and transitions orders.
#[derive(Clone)]
pub struct OrderLedger {
    db: Database,
}

impl OrderLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a new unpaid order.
    pub async fn create_order(
        &self,
        order_id: &str,
        user_id: &str,
        amount: i64,
        expires_at: i64,
    ) -> GateResult<Order> {
        let result = sqlx::query(
            "INSERT INTO orders (order_id, user_id, status, amount, expires_at, created_at) \
             VALUES (?, ?, 'pending', ?, ?, ?)",
        )
        .bind(order_id)
        .bind(user_id)
        .bind(amount)
        .bind(expires_at)
        .bind(clock::now_millis())
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(OrderErrorKind::AlreadyExists {
                    order_id: order_id.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(order_id = %order_id, user_id = %user_id, amount, "Order created");
        self.require(order_id).await
    }

    /// Confirm payment of a pending order.
    ///
    /// Repeating the call for an already paid order is a no-op.
    pub async fn mark_paid(&self, order_id: &str) -> GateResult<Order> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'paid', paid_at = ? WHERE order_id = ? AND status = 'pending'",
        )
        .bind(clock::now_millis())
        .bind(order_id)
        .execute(self.db.pool())
        .await?;

        let order = self.require(order_id).await?;
        if result.rows_affected() > 0 {
            info!(order_id = %order_id, "Order marked paid");
            return Ok(order);
        }

        match order.status {
            OrderStatus::Paid => Ok(order),
            OrderStatus::Used => Err(OrderErrorKind::AlreadyUsed.into()),
            OrderStatus::Expired => Err(OrderErrorKind::Expired.into()),
            OrderStatus::Pending => Err(OrderErrorKind::NotPaid {
                status: order.status.to_string(),
            }
            .into()),
        }
    }

    /// Fetch an order by its external id.
    pub async fn get(&self, order_id: &str) -> GateResult<Option<Order>> {
        let mut conn = self.db.pool().acquire().await?;
        Self::get_with(&mut conn, order_id).await
    }

    /// Fetch an order on an existing connection or transaction.
    pub async fn get_with(conn: &mut SqliteConnection, order_id: &str) -> GateResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("{} WHERE order_id = ?", SELECT_COLUMNS))
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Order::try_from).transpose()
    }

    /// Fetch an order, failing with `NotFound` if it does not exist.
    pub async fn status(&self, order_id: &str) -> GateResult<Order> {
        self.require(order_id).await
    }

    async fn require(&self, order_id: &str) -> GateResult<Order> {
        self.get(order_id).await?.ok_or_else(|| {
            OrderErrorKind::NotFound {
                order_id: order_id.to_string(),
            }
            .into()
        })
    }

    /// Check that an order can be exchanged for an inbound.
    ///
    /// A paid order past its deadline is flipped to `expired` on the way out.
    pub async fn verify_order(&self, order_id: &str) -> GateResult<Order> {
        self.verify_order_at(order_id, clock::now_millis()).await
    }

    pub(crate) async fn verify_order_at(&self, order_id: &str, now_ms: i64) -> GateResult<Order> {
        let order = self.require(order_id).await?;

        match order.status {
            OrderStatus::Used => return Err(OrderErrorKind::AlreadyUsed.into()),
            OrderStatus::Expired => return Err(OrderErrorKind::Expired.into()),
            OrderStatus::Pending => {
                return Err(OrderErrorKind::NotPaid {
                    status: order.status.to_string(),
                }
                .into())
            }
            OrderStatus::Paid => {}
        }

        if order.is_overdue(now_ms) {
            sqlx::query("UPDATE orders SET status = 'expired' WHERE order_id = ? AND status = 'paid'")
                .bind(order_id)
                .execute(self.db.pool())
                .await?;
            debug!(order_id = %order_id, "Overdue order expired on access");
            return Err(OrderErrorKind::Expired.into());
        }

        Ok(order)
    }

    /// Verify an order and check that it belongs to `user_id`.
    pub async fn claim(&self, order_id: &str, user_id: &str) -> GateResult<Order> {
        self.claim_at(order_id, user_id, clock::now_millis()).await
    }

    pub(crate) async fn claim_at(&self, order_id: &str, user_id: &str, now_ms: i64) -> GateResult<Order> {
        let order = self.verify_order_at(order_id, now_ms).await?;
        if order.user_id != user_id {
            info!(
                order_id = %order_id,
                order_user = %order.user_id,
                request_user = %user_id,
                "Order user mismatch"
            );
            return Err(OrderErrorKind::UserMismatch.into());
        }
        Ok(order)
    }

    /// Move a paid order to `used`, linking it to `inbound_id`.
    ///
    /// Returns `false` if the order was no longer `paid`. Run this inside the
    /// transaction that inserted the inbound.
    pub async fn commit_used(
        conn: &mut SqliteConnection,
        order_id: &str,
        inbound_id: i64,
    ) -> GateResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'used', inbound_id = ?, used_at = ? \
             WHERE order_id = ? AND status = 'paid'",
        )
        .bind(inbound_id)
        .bind(clock::now_millis())
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Expire every pending or paid order whose deadline has passed.
    pub async fn expire_overdue(&self, now_ms: i64) -> GateResult<u64> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'expired' \
             WHERE expires_at > 0 AND expires_at < ? AND status IN ('pending', 'paid')",
        )
        .bind(now_ms)
        .execute(self.db.pool())
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            info!(count = expired, "Expired overdue orders");
        }
        Ok(expired)
    }
}
