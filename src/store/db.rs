//! SQLite access shared by the credential store, order ledger and provisioner.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::debug;

/// Tables owned by the gate. Port and tag uniqueness live here, not in code.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS api_keys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        api_key TEXT NOT NULL UNIQUE,
        secret TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'active',
        rate_limit INTEGER NOT NULL DEFAULT 100,
        allowed_ips TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        last_used_at INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        amount INTEGER NOT NULL DEFAULT 0,
        paid_at INTEGER NOT NULL DEFAULT 0,
        expires_at INTEGER NOT NULL DEFAULT 0,
        inbound_id INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        used_at INTEGER NOT NULL DEFAULT 0,
        remark TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS inbounds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        up INTEGER NOT NULL DEFAULT 0,
        down INTEGER NOT NULL DEFAULT 0,
        total INTEGER NOT NULL DEFAULT 0,
        remark TEXT NOT NULL DEFAULT '',
        enable INTEGER NOT NULL DEFAULT 1,
        expiry_time INTEGER NOT NULL DEFAULT 0,
        listen TEXT NOT NULL DEFAULT '',
        port INTEGER NOT NULL UNIQUE,
        protocol TEXT NOT NULL,
        settings TEXT NOT NULL,
        stream_settings TEXT NOT NULL,
        tag TEXT NOT NULL UNIQUE,
        sniffing TEXT NOT NULL
    )
    "#,
];

/// Handle to the gate database.
///
/// The pool holds a single connection: SQLite has one writer, and the
/// provisioning transaction relies on writes being serialized.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    sqlx::Error::Configuration(
                        format!("Failed to create db directory: {}", e).into(),
                    )
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        debug!(path = %path.display(), "Database opened");
        Ok(db)
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // An in-memory database lives exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Create the gate's tables if they are missing.
    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Whether a database error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_schema_created_on_open() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("nested/gate.db")).await.unwrap();

        let _: Vec<(i64,)> = sqlx::query_as("SELECT id FROM api_keys")
            .fetch_all(db.pool())
            .await
            .unwrap();
        let _: Vec<(i64,)> = sqlx::query_as("SELECT id FROM orders")
            .fetch_all(db.pool())
            .await
            .unwrap();
        let _: Vec<(i64,)> = sqlx::query_as("SELECT id FROM inbounds")
            .fetch_all(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gate.db");

        {
            let db = Database::open(&path).await.unwrap();
            sqlx::query("INSERT INTO orders (order_id, user_id, created_at) VALUES ('O1', 'U1', 0)")
                .execute(db.pool())
                .await
                .unwrap();
            db.close().await;
        }

        let db = Database::open(&path).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_port_is_unique_violation() {
        let db = Database::open_in_memory().await.unwrap();
        let insert = "INSERT INTO inbounds (port, protocol, settings, stream_settings, tag, sniffing) \
                      VALUES (?, 'vless', '{}', '{}', ?, '{}')";

        sqlx::query(insert)
            .bind(10000)
            .bind("inbound-10000")
            .execute(db.pool())
            .await
            .unwrap();

        let err = sqlx::query(insert)
            .bind(10000)
            .bind("inbound-other")
            .execute(db.pool())
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
