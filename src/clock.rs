//! Wall-clock helpers.
//!
//! Everything the gate stores is in milliseconds since the Unix epoch. The
//! `X-Timestamp` request header is the only value carried in seconds.

use chrono::Utc;

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current time in seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}
