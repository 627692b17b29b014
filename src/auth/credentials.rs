//! API key storage and administration.

use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::FromRow;
use tracing::info;

use crate::clock;
use crate::error::GateResult;
use crate::store::Database;

/// Prefix of every issued API key.
pub const KEY_PREFIX: &str = "xui_";

const KEY_RANDOM_LEN: usize = 32;
const SECRET_LEN: usize = 64;

/// Whether a credential may authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Inactive,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Inactive => "inactive",
        }
    }

    /// Anything other than `active` is treated as disabled.
    fn from_column(value: &str) -> Self {
        if value == "active" {
            CredentialStatus::Active
        } else {
            CredentialStatus::Inactive
        }
    }
}

/// A stored API credential.
///
/// The secret is only reachable through [`Credential::secret`]; it is skipped
/// by `Serialize` and redacted by `Debug`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: i64,
    pub key: String,
    #[serde(skip)]
    secret: String,
    pub name: String,
    pub status: CredentialStatus,
    pub rate_limit: u32,
    pub allowed_ips: Vec<String>,
    pub created_at: i64,
    pub last_used_at: i64,
}

impl Credential {
    /// Secret bytes used as the HMAC key.
    pub fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    pub fn is_active(&self) -> bool {
        self.status == CredentialStatus::Active
    }

    /// Whether a request from `ip` passes the allow-list. An empty list allows all.
    pub fn allows_ip(&self, ip: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.iter().any(|allowed| allowed == ip)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("rate_limit", &self.rate_limit)
            .field("allowed_ips", &self.allowed_ips)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

#[derive(FromRow)]
struct CredentialRow {
    id: i64,
    api_key: String,
    secret: String,
    name: String,
    status: String,
    rate_limit: i64,
    allowed_ips: String,
    created_at: i64,
    last_used_at: i64,
}

impl From<CredentialRow> for Credential {
    fn from(row: CredentialRow) -> Self {
        Self {
            id: row.id,
            key: row.api_key,
            secret: row.secret,
            name: row.name,
            status: CredentialStatus::from_column(&row.status),
            rate_limit: u32::try_from(row.rate_limit).unwrap_or(0),
            allowed_ips: parse_allowed_ips(&row.allowed_ips),
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        }
    }
}

/// Split a stored comma-separated allow-list, trimming whitespace.
pub fn parse_allowed_ips(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .collect()
}

/// Key material returned once when a credential is issued.
pub struct IssuedKey {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for IssuedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedKey")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

const SELECT_COLUMNS: &str = "SELECT id, api_key, secret, name, status, rate_limit, allowed_ips, \
                              created_at, last_used_at FROM api_keys";

/// Lookup and administration of API credentials.
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Find a credential by its public key.
    pub async fn find(&self, key: &str) -> GateResult<Option<Credential>> {
        let row: Option<CredentialRow> =
            sqlx::query_as(&format!("{} WHERE api_key = ?", SELECT_COLUMNS))
                .bind(key)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(row.map(Credential::from))
    }

    /// All credentials, oldest first.
    pub async fn list(&self) -> GateResult<Vec<Credential>> {
        let rows: Vec<CredentialRow> = sqlx::query_as(&format!("{} ORDER BY id", SELECT_COLUMNS))
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(Credential::from).collect())
    }

    /// Issue a new active credential.
    pub async fn create(
        &self,
        name: &str,
        rate_limit: u32,
        allowed_ips: &[String],
    ) -> GateResult<IssuedKey> {
        let issued = IssuedKey {
            key: format!("{}{}", KEY_PREFIX, random_alphanumeric(KEY_RANDOM_LEN)),
            secret: random_alphanumeric(SECRET_LEN),
        };

        sqlx::query(
            "INSERT INTO api_keys (api_key, secret, name, status, rate_limit, allowed_ips, created_at) \
             VALUES (?, ?, ?, 'active', ?, ?, ?)",
        )
        .bind(&issued.key)
        .bind(&issued.secret)
        .bind(name)
        .bind(i64::from(rate_limit))
        .bind(allowed_ips.join(","))
        .bind(clock::now_millis())
        .execute(self.db.pool())
        .await?;

        info!(key = %issued.key, name = %name, rate_limit, "API key issued");
        Ok(issued)
    }

    /// Enable or disable a credential. Returns whether the key exists.
    pub async fn set_status(&self, key: &str, status: CredentialStatus) -> GateResult<bool> {
        let result = sqlx::query("UPDATE api_keys SET status = ? WHERE api_key = ?")
            .bind(status.as_str())
            .bind(key)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            info!(key = %key, status = status.as_str(), "API key status changed");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Delete a credential. Returns whether the key existed.
    pub async fn delete(&self, key: &str) -> GateResult<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE api_key = ?")
            .bind(key)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            info!(key = %key, "API key deleted");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Record the last successful use of a credential.
    pub async fn touch_last_used(&self, id: i64, at_millis: i64) -> GateResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(at_millis)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}
