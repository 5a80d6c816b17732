//! Risk-budget position sizing.

use crate::domain::error::PerpbotError;

/// Size a position so that hitting the stop loses `risk_fraction` of balance.
///
/// `size = balance * risk_fraction / |entry - stop| * leverage`, capped at
/// `max_size` and never negative. A stop equal to entry has no price risk to
/// budget against and is rejected rather than divided by.
pub fn position_size(
    balance: f64,
    risk_fraction: f64,
    entry_price: f64,
    stop_price: f64,
    leverage: f64,
    max_size: f64,
) -> Result<f64, PerpbotError> {
    let price_risk = (entry_price - stop_price).abs();
    if price_risk <= 0.0 || !price_risk.is_finite() {
        return Err(PerpbotError::InvalidRisk {
            entry_price,
            stop_price,
        });
    }

    let risk_amount = balance * risk_fraction;
    let raw = risk_amount / price_risk * leverage;
    Ok(raw.min(max_size).max(0.0))
}
