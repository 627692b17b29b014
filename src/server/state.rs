//! Shared state handed to every request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditLogger};
use crate::auth::{AuthGate, CredentialStore};
use crate::config::{AuditConfig, Settings};
use crate::inbound::{ProtocolRegistry, Provisioner};
use crate::orders::{start_sweep_task, OrderLedger};
use crate::store::Database;

/// Components shared by the middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub ledger: OrderLedger,
    pub provisioner: Arc<Provisioner>,
    pub audit: Option<Arc<AuditLogger>>,
    pub(crate) api_prefix: String,
    pub(crate) max_body_size: usize,
    pub(crate) trust_proxy_headers: bool,
    pub(crate) permits: Arc<Semaphore>,
}

impl AppState {
    /// Wire every component on top of one database.
    pub fn new(db: Database, settings: &Settings) -> Self {
        let gate = AuthGate::from_config(CredentialStore::new(db.clone()), &settings.security);
        let ledger = OrderLedger::new(db.clone());
        let provisioner = Provisioner::new(
            db,
            ledger.clone(),
            ProtocolRegistry::new(),
            &settings.provisioning,
        );

        info!(
            max_requests = settings.security.default_rate_limit,
            window_seconds = settings.security.rate_limit_window_seconds,
            "Per-key rate limiting enabled"
        );

        Self {
            gate: Arc::new(gate),
            ledger,
            provisioner: Arc::new(provisioner),
            audit: open_audit_logger(&settings.audit),
            api_prefix: settings.server.api_prefix.clone(),
            max_body_size: settings.limits.max_body_size,
            trust_proxy_headers: settings.server.trust_proxy_headers,
            permits: Arc::new(Semaphore::new(settings.limits.max_concurrent_requests.max(1))),
        }
    }

    /// Spawn nonce and rate-window cleanup plus the expired-order sweep.
    pub fn start_background_tasks(&self, settings: &Settings) {
        self.gate
            .start_cleanup_tasks(Duration::from_secs(settings.security.cleanup_interval_seconds));

        if settings.maintenance.order_sweep_enabled {
            let interval = Duration::from_secs(settings.maintenance.order_sweep_interval_seconds);
            start_sweep_task(self.ledger.clone(), interval);
            info!(interval_seconds = interval.as_secs(), "Order sweep enabled");
        } else {
            info!("Order sweep disabled");
        }
    }

    /// Append an entry to the audit log, if one is configured.
    pub(crate) fn record(&self, entry: &AuditEntry) {
        if let Some(ref logger) = self.audit {
            if let Err(e) = logger.log(entry) {
                warn!(error = %e, "Failed to write audit entry");
            }
        }
    }
}

fn open_audit_logger(config: &AuditConfig) -> Option<Arc<AuditLogger>> {
    if !config.enabled {
        info!("Audit logging disabled");
        return None;
    }

    match AuditLogger::open(config) {
        Ok(logger) => {
            info!(path = %config.log_path.display(), "Audit logging enabled");
            Some(Arc::new(logger))
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %config.log_path.display(),
                "Failed to create audit logger, audit logging disabled"
            );
            None
        }
    }
}
