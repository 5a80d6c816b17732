//! Protective level placement and per-bar exit evaluation.

use crate::domain::config::{SessionConfig, TpSlMode};
use crate::domain::error::PerpbotError;
use crate::domain::position::{CloseReason, Position, Side};
use crate::domain::signal::Signal;

/// Compute (stop_loss, take_profit) for an entry at `entry_price`.
///
/// In ATR mode an entry without an ATR value available is refused; the
/// caller skips the trade rather than guessing levels.
pub fn protective_levels(
    config: &SessionConfig,
    side: Side,
    entry_price: f64,
    atr: Option<f64>,
) -> Result<(f64, f64), PerpbotError> {
    let dir = side.direction();
    match config.tp_sl_mode {
        TpSlMode::Percentage => {
            let sl = entry_price * (1.0 - dir * config.sl_multiplier);
            let tp = entry_price * (1.0 + dir * config.tp_multiplier);
            Ok((sl, tp))
        }
        TpSlMode::Atr => {
            let atr = atr.ok_or_else(|| PerpbotError::Data {
                source_name: "atr".to_string(),
                reason: "not enough bars to compute ATR for level placement".to_string(),
            })?;
            let sl = entry_price - dir * atr * config.sl_multiplier;
            let tp = entry_price + dir * atr * config.tp_multiplier;
            Ok((sl, tp))
        }
    }
}

/// Relative slack for level comparisons. Multiplier arithmetic can land a
/// level within float noise of the intended price, and an exact touch of a
/// configured level must still trigger.
const LEVEL_TOLERANCE: f64 = 1e-9;

fn touches_or_below(price: f64, level: f64) -> bool {
    price <= level + level.abs() * LEVEL_TOLERANCE
}

fn touches_or_above(price: f64, level: f64) -> bool {
    price >= level - level.abs() * LEVEL_TOLERANCE
}

/// Evaluate exits for one bar at `price`, in fixed order: stop-loss first,
/// then take-profit, then the trailing stop. At most one exit fires.
///
/// The stop-loss check runs first so the worst case wins when a price
/// satisfies both levels (including a stop configured equal to the target).
/// Configured levels trigger on an exact touch. The trailing stop ratchets
/// before it is compared and requires a strict cross back through it, since
/// the bar that arms it always sits exactly one distance above it.
pub fn evaluate_exit(
    config: &SessionConfig,
    position: &mut Position,
    price: f64,
) -> Option<CloseReason> {
    let long = position.is_long();

    let stop_hit = if long {
        touches_or_below(price, position.stop_loss)
    } else {
        touches_or_above(price, position.stop_loss)
    };
    if stop_hit {
        return Some(CloseReason::StopLoss);
    }

    let target_hit = if long {
        touches_or_above(price, position.take_profit)
    } else {
        touches_or_below(price, position.take_profit)
    };
    if target_hit {
        return Some(CloseReason::TakeProfit);
    }

    if config.use_trailing_stop {
        update_trailing_stop(config, position, price);
        if let Some(trail) = position.trailing_stop {
            let trail_hit = if long { price < trail } else { price > trail };
            if trail_hit {
                return Some(CloseReason::TrailingStop);
            }
        }
    }

    None
}

/// An effective signal opposite to the open side closes the position.
/// Checked after the protective exits so they keep priority within a bar.
pub fn signal_flip(position: &Position, effective: Signal) -> Option<CloseReason> {
    let flip = match (position.side, effective) {
        (Side::Long, Signal::Short) | (Side::Short, Signal::Long) => true,
        _ => false,
    };
    flip.then_some(CloseReason::SignalFlip)
}

fn update_trailing_stop(config: &SessionConfig, position: &mut Position, price: f64) {
    if position.profit_fraction(price) < config.trailing_stop_activation {
        return;
    }
    let dir = position.side.direction();
    let candidate = price * (1.0 - dir * config.trailing_stop_distance);
    position.trailing_stop = Some(match position.trailing_stop {
        Some(current) if position.is_long() => candidate.max(current),
        Some(current) => candidate.min(current),
        None => candidate,
    });
}
