//! Audit entry types.

use serde::Serialize;
use uuid::Uuid;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 time the request finished.
    pub timestamp: String,
    /// Identifier also returned in the `X-Request-Id` header.
    pub request_id: Uuid,
    /// Request path.
    pub endpoint: String,
    /// Public API key, absent when the request carried none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Address the request was attributed to.
    pub source_ip: String,
    /// Sanitized request body.
    pub params: serde_json::Value,
    pub result: AuditResult,
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Start an entry for a request; the result defaults to success.
    pub fn new(request_id: Uuid, endpoint: impl Into<String>, source_ip: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
            endpoint: endpoint.into(),
            api_key: None,
            source_ip: source_ip.into(),
            params: serde_json::Value::Null,
            result: AuditResult::Success,
            duration_ms: 0,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Mark the call as failed.
    pub fn failed(mut self, error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        self.result = AuditResult::Failure {
            error_code: error_code.into(),
            error_message: error_message.into(),
        };
        self
    }
}

/// Outcome of an audited call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum AuditResult {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failure")]
    Failure {
        error_code: String,
        error_message: String,
    },
}
