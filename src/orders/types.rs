//! Order types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::GateError;

/// Lifecycle state of an order.
///
/// `pending -> paid -> used`, with `pending | paid -> expired` once the order
/// passes its deadline. `used` and `expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Used,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Used => "used",
            OrderStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "used" => Ok(OrderStatus::Used),
            "expired" => Ok(OrderStatus::Expired),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// A purchase that can be exchanged for one inbound.
///
/// All times are millisecond epochs; zero means unset. An `expires_at` of zero
/// never expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub amount: i64,
    pub paid_at: i64,
    pub expires_at: i64,
    pub inbound_id: i64,
    pub created_at: i64,
    pub used_at: i64,
    pub remark: String,
}

impl Order {
    /// Whether the deadline has passed at `now_ms`.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.expires_at > 0 && self.expires_at < now_ms
    }
}

#[derive(FromRow)]
pub(crate) struct OrderRow {
    id: i64,
    order_id: String,
    user_id: String,
    status: String,
    amount: i64,
    paid_at: i64,
    expires_at: i64,
    inbound_id: i64,
    created_at: i64,
    used_at: i64,
    remark: String,
}

impl TryFrom<OrderRow> for Order {
    type Error = GateError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e: String| GateError::Database(sqlx::Error::Decode(e.into())))?;

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            status,
            amount: row.amount,
            paid_at: row.paid_at,
            expires_at: row.expires_at,
            inbound_id: row.inbound_id,
            created_at: row.created_at,
            used_at: row.used_at,
            remark: row.remark,
        })
    }
}
