//! Domain error types.

/// Top-level error type for perpbot.
#[derive(Debug, thiserror::Error)]
pub enum PerpbotError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid risk: entry {entry_price} equals stop {stop_price}")]
    InvalidRisk { entry_price: f64, stop_price: f64 },

    #[error("position already open for {symbol}")]
    PositionAlreadyOpen { symbol: String },

    #[error("exchange error: {reason}")]
    Exchange { reason: String },

    #[error("data error in {source_name}: {reason}")]
    Data { source_name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PerpbotError> for std::process::ExitCode {
    fn from(err: &PerpbotError) -> Self {
        let code: u8 = match err {
            PerpbotError::Io(_) => 1,
            PerpbotError::ConfigParse { .. }
            | PerpbotError::ConfigMissing { .. }
            | PerpbotError::ConfigInvalid { .. } => 2,
            PerpbotError::Exchange { .. } => 3,
            PerpbotError::InvalidRisk { .. } | PerpbotError::PositionAlreadyOpen { .. } => 4,
            PerpbotError::Data { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
