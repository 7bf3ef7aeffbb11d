//! Application layer: quoting, destination resolution, command building, and staging.

pub mod actions;
pub mod command;
pub mod quote;
pub mod staging;
pub mod target;
