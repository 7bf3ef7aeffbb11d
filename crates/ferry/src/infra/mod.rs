//! Infrastructure adapters for configuration and process execution.

pub mod config;
pub mod executor;
