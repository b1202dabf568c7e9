//! portsim - rule-driven portfolio simulator.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`runner`] executes simulation
//! runs on background threads and [`cli`] is the command-line shell.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod runner;
pub mod cli;
