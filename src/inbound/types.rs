//! Inbound types.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

/// Sniffing document used when a request does not supply one.
pub const DEFAULT_SNIFFING: &str = r#"{"enabled":true,"destOverride":["http","tls"]}"#;
/// Stream settings document used when a request does not supply one.
pub const DEFAULT_STREAM_SETTINGS: &str = "{}";

/// A stored proxy inbound.
///
/// `settings`, `stream_settings` and `sniffing` are JSON documents kept as
/// text; the gate never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    pub id: i64,
    pub up: i64,
    pub down: i64,
    pub total: i64,
    pub remark: String,
    pub enable: bool,
    pub expiry_time: i64,
    pub listen: String,
    pub port: u16,
    pub protocol: String,
    pub settings: String,
    pub stream_settings: String,
    pub tag: String,
    pub sniffing: String,
}

/// Tag derived from the port, unique like the port itself.
pub fn tag_for_port(port: u16) -> String {
    format!("inbound-{}", port)
}

/// Inbound fields chosen before a port is known to be free.
#[derive(Debug, Clone)]
pub(crate) struct InboundDraft {
    pub total: i64,
    pub remark: String,
    pub expiry_time: i64,
    pub listen: String,
    pub protocol: String,
    pub settings: String,
    pub stream_settings: String,
    pub sniffing: String,
}

impl InboundDraft {
    /// Insert the draft on `port`, returning the new row id.
    pub async fn insert(&self, conn: &mut SqliteConnection, port: u16) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO inbounds (up, down, total, remark, enable, expiry_time, listen, port, \
             protocol, settings, stream_settings, tag, sniffing) \
             VALUES (0, 0, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.total)
        .bind(&self.remark)
        .bind(self.expiry_time)
        .bind(&self.listen)
        .bind(i64::from(port))
        .bind(&self.protocol)
        .bind(&self.settings)
        .bind(&self.stream_settings)
        .bind(tag_for_port(port))
        .bind(&self.sniffing)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

/// Load an inbound by id.
pub(crate) async fn fetch_inbound(conn: &mut SqliteConnection, id: i64) -> Result<Option<Inbound>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, up, down, total, remark, enable, expiry_time, listen, port, protocol, \
         settings, stream_settings, tag, sniffing FROM inbounds WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}
