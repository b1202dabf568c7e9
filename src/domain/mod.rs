//! Core domain types and logic.

pub mod bar;
pub mod series;
pub mod portfolio;
pub mod execution;
pub mod valuation;
pub mod analytics;
pub mod rule;
pub mod rule_parser;
pub mod simulation;
pub mod error;
