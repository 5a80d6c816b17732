//! Session configuration: construction from a config source and validation.

use crate::domain::error::PerpbotError;
use crate::ports::config_port::ConfigPort;

/// How protective levels are placed at entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpSlMode {
    /// Levels offset from entry by a fraction of the entry price.
    Percentage,
    /// Levels offset from entry by a multiple of ATR.
    Atr,
}

impl TpSlMode {
    fn parse(value: &str) -> Option<TpSlMode> {
        match value.to_lowercase().as_str() {
            "percentage" | "pct" => Some(TpSlMode::Percentage),
            "atr" => Some(TpSlMode::Atr),
            _ => None,
        }
    }
}

/// Immutable settings for one trading session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub symbol: String,
    pub timeframe: String,
    pub initial_balance: f64,
    pub risk_per_trade: f64,
    pub max_position_size: f64,
    pub leverage: f64,
    pub tp_sl_mode: TpSlMode,
    pub sl_multiplier: f64,
    pub tp_multiplier: f64,
    pub atr_period: usize,
    pub use_trailing_stop: bool,
    pub trailing_stop_activation: f64,
    pub trailing_stop_distance: f64,
    pub warmup_bars: usize,
    pub poll_interval_secs: u64,
    pub status_interval_secs: u64,
    pub order_retry_count: u32,
    pub order_retry_delay_secs: u64,
}

impl SessionConfig {
    /// Read and validate a session config. Fails fast on the first bad field.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PerpbotError> {
        let symbol = require_string(config, "session", "symbol")?;
        let timeframe = config
            .get_string("session", "timeframe")
            .unwrap_or_else(|| "1h".to_string());

        let mode_str = config
            .get_string("session", "tp_sl_mode")
            .unwrap_or_else(|| "atr".to_string());
        let tp_sl_mode = TpSlMode::parse(&mode_str).ok_or_else(|| PerpbotError::ConfigInvalid {
            section: "session".to_string(),
            key: "tp_sl_mode".to_string(),
            reason: format!("unknown mode '{mode_str}', expected 'percentage' or 'atr'"),
        })?;

        // Raw i64 values are range-checked before narrowing; a negative
        // count would otherwise wrap into an enormous unsigned one.
        let order_retry_count = u32::try_from(non_negative_int(config, "order_retry_count", 3)?)
            .map_err(|_| invalid("order_retry_count", "order_retry_count is out of range"))?;

        let cfg = SessionConfig {
            symbol,
            timeframe,
            initial_balance: config.get_double("session", "initial_balance", 10_000.0),
            risk_per_trade: config.get_double("session", "risk_per_trade", 0.02),
            max_position_size: config.get_double("session", "max_position_size", 1.0),
            leverage: config.get_double("session", "leverage", 1.0),
            tp_sl_mode,
            sl_multiplier: config.get_double("session", "sl_multiplier", 2.0),
            tp_multiplier: config.get_double("session", "tp_multiplier", 3.0),
            atr_period: non_negative_int(config, "atr_period", 14)? as usize,
            use_trailing_stop: config.get_bool("session", "use_trailing_stop", false),
            trailing_stop_activation: config.get_double("session", "trailing_stop_activation", 0.01),
            trailing_stop_distance: config.get_double("session", "trailing_stop_distance", 0.005),
            warmup_bars: non_negative_int(config, "warmup_bars", 0)? as usize,
            poll_interval_secs: non_negative_int(config, "poll_interval_secs", 10)? as u64,
            status_interval_secs: non_negative_int(config, "status_interval_secs", 600)? as u64,
            order_retry_count,
            order_retry_delay_secs: non_negative_int(config, "order_retry_delay_secs", 5)? as u64,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), PerpbotError> {
        validate_positive(self.initial_balance, "initial_balance")?;
        validate_fraction(self.risk_per_trade, "risk_per_trade")?;
        validate_positive(self.max_position_size, "max_position_size")?;
        validate_positive(self.leverage, "leverage")?;
        validate_positive(self.sl_multiplier, "sl_multiplier")?;
        validate_positive(self.tp_multiplier, "tp_multiplier")?;
        if self.tp_sl_mode == TpSlMode::Atr && self.atr_period == 0 {
            return Err(invalid("atr_period", "atr_period must be at least 1"));
        }
        // In percentage mode the multipliers are fractions of the entry
        // price; anything >= 1 would place the stop at or below zero.
        if self.tp_sl_mode == TpSlMode::Percentage && self.sl_multiplier >= 1.0 {
            return Err(invalid(
                "sl_multiplier",
                "sl_multiplier must be below 1 in percentage mode",
            ));
        }
        if self.use_trailing_stop {
            validate_fraction(self.trailing_stop_activation, "trailing_stop_activation")?;
            validate_fraction(self.trailing_stop_distance, "trailing_stop_distance")?;
        }
        if self.poll_interval_secs == 0 {
            return Err(invalid("poll_interval_secs", "poll_interval_secs must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> PerpbotError {
    PerpbotError::ConfigInvalid {
        section: "session".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, PerpbotError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(PerpbotError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn non_negative_int(
    config: &dyn ConfigPort,
    key: &str,
    default: i64,
) -> Result<i64, PerpbotError> {
    let value = config.get_int("session", key, default);
    if value < 0 {
        return Err(invalid(key, &format!("{key} must not be negative")));
    }
    Ok(value)
}

fn validate_positive(value: f64, key: &str) -> Result<(), PerpbotError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(invalid(key, &format!("{key} must be positive")));
    }
    Ok(())
}

fn validate_fraction(value: f64, key: &str) -> Result<(), PerpbotError> {
    if value <= 0.0 || value >= 1.0 {
        return Err(invalid(key, &format!("{key} must be between 0 and 1")));
    }
    Ok(())
}
