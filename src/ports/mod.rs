//! Port traits consumed by the core.

pub mod config_port;
pub mod price_port;
