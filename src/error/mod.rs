//! Error types for the inbound gate.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
