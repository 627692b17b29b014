//! Persistence module.
//!
//! Wraps the SQLite pool and owns the table definitions.

mod db;

pub use db::{is_unique_violation, Database};
