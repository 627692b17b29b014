//! Parameter sanitization for audit logging.

use serde_json::{Map, Value};

/// Key fragments whose values are never written to the audit log.
///
/// `settings` covers `streamSettings` and carries client ids and passwords.
const SENSITIVE_KEYS: &[&str] = &[
    "settings",
    "password",
    "secret",
    "signature",
    "token",
    "authorization",
];

/// Maximum length for string values before truncation.
const MAX_STRING_LENGTH: usize = 512;

/// Return a copy of `params` safe to write to the audit log.
///
/// Values under sensitive keys are redacted at any depth and long strings
/// are replaced by their length.
pub fn sanitize_params(params: &Value) -> Value {
    match params {
        Value::Object(map) => {
            let mut sanitized = Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase();
                if SENSITIVE_KEYS.iter().any(|&s| key_lower.contains(s)) {
                    sanitized.insert(key.clone(), Value::String("[REDACTED]".to_string()));
                } else {
                    sanitized.insert(key.clone(), sanitize_params(val));
                }
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_params).collect()),
        Value::String(s) if s.len() > MAX_STRING_LENGTH => {
            Value::String(format!("[TRUNCATED - {} bytes]", s.len()))
        }
        _ => params.clone(),
    }
}
