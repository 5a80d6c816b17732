//! Core domain types and logic.

pub mod candle;
pub mod config;
pub mod error;
pub mod exit_policy;
pub mod ledger;
pub mod position;
pub mod report;
pub mod session;
pub mod signal;
pub mod sizing;
