//! Inbound Gate Library
//!
//! This crate provides the core functionality for the inbound gate, a
//! signed-request HTTP API that turns paid orders into proxy inbounds.

pub mod admin;
pub mod audit;
pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod inbound;
pub mod orders;
pub mod protocol;
pub mod server;
pub mod store;
