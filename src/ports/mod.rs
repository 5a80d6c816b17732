//! Port traits for injected collaborators.

pub mod config_port;
pub mod exchange_port;
pub mod notifier_port;
pub mod signal_source;
