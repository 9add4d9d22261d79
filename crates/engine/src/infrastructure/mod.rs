//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod config;
pub mod filter_aliases;
pub mod http_provider;
pub mod importers;
pub mod ports;
pub mod sqlite;
