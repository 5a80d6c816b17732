//! Concrete adapter implementations for ports.

pub mod csv_candles;
pub mod ema_cross;
pub mod file_config_adapter;
pub mod log_notifier;
pub mod paper_exchange;
