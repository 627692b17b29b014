//! Configuration settings for the inbound gate.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::GateError;

/// Main configuration structure for the gate.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on.
    pub bind: SocketAddr,
    /// Path prefix for the protected API routes.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Take the client IP from `X-Real-IP` / `X-Forwarded-For`.
    ///
    /// Only enable behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Request authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Maximum age of a request timestamp in seconds.
    #[serde(default = "default_max_request_age")]
    pub max_request_age_seconds: u64,
    /// Maximum amount a request timestamp may lie in the future, in seconds.
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_seconds: u64,
    /// Rate limit window in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: u64,
    /// Ceiling used for keys stored without a rate limit.
    #[serde(default = "default_rate_limit_requests")]
    pub default_rate_limit: u32,
    /// Interval between nonce/rate-window cleanups in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

/// Inbound provisioning configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    /// First port considered by automatic allocation.
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,
    /// Last port considered by automatic allocation.
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,
    /// How many times an insert may lose a port race before giving up.
    #[serde(default = "default_max_port_retries")]
    pub max_port_retries: u32,
}

/// Background maintenance configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Whether the expired-order sweep runs.
    #[serde(default = "default_sweep_enabled")]
    pub order_sweep_enabled: bool,
    /// Interval between expired-order sweeps in seconds.
    #[serde(default = "default_sweep_interval")]
    pub order_sweep_interval_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Maximum concurrent in-flight requests.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Time allowed for in-flight requests to drain on shutdown, in seconds.
    #[serde(default = "default_drain_timeout")]
    pub shutdown_drain_seconds: u64,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
    /// Rotate the log to `<log_path>.1` once it would exceed this size (0 = never).
    #[serde(default = "default_audit_max_file_bytes")]
    pub max_file_bytes: u64,
}

// Default value functions
fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_max_request_age() -> u64 {
    300
}

fn default_max_clock_skew() -> u64 {
    60
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_port_range_start() -> u16 {
    10000
}

fn default_port_range_end() -> u16 {
    65535
}

fn default_max_port_retries() -> u32 {
    8
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_body_size() -> usize {
    65_536
}

fn default_max_concurrent() -> usize {
    256
}

fn default_drain_timeout() -> u64 {
    30
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/inbound-gate/audit.log")
}

fn default_audit_max_file_bytes() -> u64 {
    64 * 1024 * 1024
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_request_age_seconds: default_max_request_age(),
            max_clock_skew_seconds: default_max_clock_skew(),
            rate_limit_window_seconds: default_rate_limit_window(),
            default_rate_limit: default_rate_limit_requests(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            port_range_start: default_port_range_start(),
            port_range_end: default_port_range_end(),
            max_port_retries: default_max_port_retries(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            order_sweep_enabled: default_sweep_enabled(),
            order_sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
            max_concurrent_requests: default_max_concurrent(),
            shutdown_drain_seconds: default_drain_timeout(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
            max_file_bytes: default_audit_max_file_bytes(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GateError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            GateError::Config { message } => GateError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, GateError> {
        let settings: Settings = toml::from_str(content).map_err(|e| GateError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), GateError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(GateError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(GateError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if !self.server.api_prefix.starts_with('/') || self.server.api_prefix.ends_with('/') {
            return Err(GateError::Config {
                message: format!(
                    "Invalid api_prefix '{}'. Must start with '/' and not end with one",
                    self.server.api_prefix
                ),
            });
        }

        let provisioning = &self.provisioning;
        if provisioning.port_range_start == 0
            || provisioning.port_range_start > provisioning.port_range_end
        {
            return Err(GateError::Config {
                message: format!(
                    "Invalid port range {}-{}",
                    provisioning.port_range_start, provisioning.port_range_end
                ),
            });
        }

        if self.security.rate_limit_window_seconds == 0
            || self.security.max_request_age_seconds == 0
            || self.security.cleanup_interval_seconds == 0
        {
            return Err(GateError::Config {
                message: "Security windows and intervals must be non-zero".to_string(),
            });
        }

        if self.maintenance.order_sweep_interval_seconds == 0 {
            return Err(GateError::Config {
                message: "order_sweep_interval_seconds must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}
