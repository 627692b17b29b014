//! HTTP server module.
//!
//! Exposes the signed API over axum: request ids on every response, the
//! authentication middleware in front of the protected routes, and a
//! listener with graceful shutdown.

mod handlers;
mod listener;
mod middleware;
mod reply;
mod router;
mod state;

pub use listener::GateServer;
pub use middleware::RequestId;
pub use router::build_router;
pub use state::AppState;
