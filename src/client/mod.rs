//! Signing API client.
//!
//! The counterpart of the server's authentication: serializes a payload
//! once, signs those exact bytes, and sends them.

mod api;
mod signer;

pub use api::{ApiClient, REQUEST_TIMEOUT};
pub use signer::SignedHeaders;
