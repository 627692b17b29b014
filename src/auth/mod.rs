//! Authentication module.
//!
//! Handles API credentials, HMAC request signing, nonce replay protection,
//! and per-key rate limiting.

mod credentials;
mod gate;
pub mod hmac;
mod nonce;
mod rate_limit;

pub use credentials::{
    parse_allowed_ips, Credential, CredentialStatus, CredentialStore, IssuedKey, KEY_PREFIX,
};
pub use gate::{AuthGate, Authenticated};
pub use nonce::ReplayGuard;
pub use rate_limit::RateLimiter;
