//! Audit logging module.
//!
//! Records every protected API call as one JSON object per line.
//!
//! ## Features
//!
//! - Endpoint, API key id, source IP, outcome and timing per call
//! - Request parameters with settings documents and passwords redacted
//! - Truncation of oversized string values
//! - Appends from a single writer task with a data sync after each entry
//! - Size-based rotation to `<path>.1`

mod entry;
mod logger;
mod sanitize;

pub use entry::{AuditEntry, AuditResult};
pub use logger::{rotated_path, AuditLogger};
pub use sanitize::sanitize_params;
