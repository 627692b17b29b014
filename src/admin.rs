//! Maintenance commands run from the command line instead of serving.
//!
//! Key administration and the order entry points used by the payment side:
//! creating an order and confirming its payment.

use std::fmt::Write as _;

use crate::auth::{parse_allowed_ips, CredentialStatus, CredentialStore};
use crate::error::{GateError, GateResult};
use crate::orders::OrderLedger;
use crate::store::Database;

/// A one-shot maintenance command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    CreateKey {
        name: String,
        rate_limit: Option<u32>,
        allowed_ips: Vec<String>,
    },
    ListKeys,
    SetKeyStatus {
        key: String,
        status: CredentialStatus,
    },
    DeleteKey {
        key: String,
    },
    CreateOrder {
        order_id: String,
        user_id: String,
        amount: i64,
        expires_at: i64,
    },
    MarkPaid {
        order_id: String,
    },
}

/// Value of `--name VALUE` or `--name=VALUE` (or the short form).
pub fn arg_value(args: &[String], long: &str, short: Option<&str>) -> Option<String> {
    for (i, arg) in args.iter().enumerate() {
        if (arg == long || Some(arg.as_str()) == short) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(value) = arg.strip_prefix(long).and_then(|rest| rest.strip_prefix('=')) {
            return Some(value.to_string());
        }
    }
    None
}

fn parse_number<T: std::str::FromStr>(args: &[String], flag: &str) -> GateResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    arg_value(args, flag, None)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| GateError::Config {
                message: format!("Invalid {} '{}': {}", flag, raw, e),
            })
        })
        .transpose()
}

impl AdminCommand {
    /// Pick the maintenance command named on the command line, if any.
    pub fn from_args(args: &[String]) -> GateResult<Option<Self>> {
        if let Some(name) = arg_value(args, "--create-key", None) {
            return Ok(Some(AdminCommand::CreateKey {
                name,
                rate_limit: parse_number(args, "--rate-limit")?,
                allowed_ips: arg_value(args, "--allowed-ips", None)
                    .map(|raw| parse_allowed_ips(&raw))
                    .unwrap_or_default(),
            }));
        }

        if args.iter().any(|a| a == "--list-keys") {
            return Ok(Some(AdminCommand::ListKeys));
        }

        for (flag, status) in [
            ("--enable-key", CredentialStatus::Active),
            ("--disable-key", CredentialStatus::Inactive),
        ] {
            if let Some(key) = arg_value(args, flag, None) {
                return Ok(Some(AdminCommand::SetKeyStatus { key, status }));
            }
        }

        if let Some(key) = arg_value(args, "--delete-key", None) {
            return Ok(Some(AdminCommand::DeleteKey { key }));
        }

        if let Some(order_id) = arg_value(args, "--create-order", None) {
            let user_id = arg_value(args, "--user", None).ok_or_else(|| GateError::Config {
                message: "--create-order requires --user".to_string(),
            })?;
            return Ok(Some(AdminCommand::CreateOrder {
                order_id,
                user_id,
                amount: parse_number(args, "--amount")?.unwrap_or(0),
                expires_at: parse_number(args, "--expires-at")?.unwrap_or(0),
            }));
        }

        if let Some(order_id) = arg_value(args, "--mark-paid", None) {
            return Ok(Some(AdminCommand::MarkPaid { order_id }));
        }

        Ok(None)
    }

    /// Run the command and return the text to print.
    ///
    /// `default_rate_limit` applies to keys created without `--rate-limit`.
    pub async fn run(self, db: &Database, default_rate_limit: u32) -> GateResult<String> {
        let credentials = CredentialStore::new(db.clone());
        let ledger = OrderLedger::new(db.clone());
        let mut out = String::new();

        match self {
            AdminCommand::CreateKey {
                name,
                rate_limit,
                allowed_ips,
            } => {
                let issued = credentials
                    .create(&name, rate_limit.unwrap_or(default_rate_limit), &allowed_ips)
                    .await?;
                let _ = writeln!(out, "API key:    {}", issued.key);
                let _ = writeln!(out, "API secret: {}", issued.secret);
                let _ = writeln!(out, "The secret is shown only once; store it now.");
            }
            AdminCommand::ListKeys => {
                for credential in credentials.list().await? {
                    let _ = writeln!(
                        out,
                        "{}\t{}\t{}\trate={}\tips={}\tlast_used={}",
                        credential.key,
                        credential.name,
                        credential.status.as_str(),
                        credential.rate_limit,
                        if credential.allowed_ips.is_empty() {
                            "*".to_string()
                        } else {
                            credential.allowed_ips.join(",")
                        },
                        credential.last_used_at,
                    );
                }
            }
            AdminCommand::SetKeyStatus { key, status } => {
                if !credentials.set_status(&key, status).await? {
                    return Err(unknown_key(&key));
                }
                let _ = writeln!(out, "{} is now {}", key, status.as_str());
            }
            AdminCommand::DeleteKey { key } => {
                if !credentials.delete(&key).await? {
                    return Err(unknown_key(&key));
                }
                let _ = writeln!(out, "{} deleted", key);
            }
            AdminCommand::CreateOrder {
                order_id,
                user_id,
                amount,
                expires_at,
            } => {
                let order = ledger
                    .create_order(&order_id, &user_id, amount, expires_at)
                    .await?;
                let _ = writeln!(out, "{} created for {} ({})", order.order_id, order.user_id, order.status);
            }
            AdminCommand::MarkPaid { order_id } => {
                let order = ledger.mark_paid(&order_id).await?;
                let _ = writeln!(out, "{} is {}", order.order_id, order.status);
            }
        }

        Ok(out)
    }
}

fn unknown_key(key: &str) -> GateError {
    GateError::Config {
        message: format!("No API key '{}'", key),
    }
}
