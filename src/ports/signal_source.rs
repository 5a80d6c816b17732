//! Strategy signal port trait.

use crate::domain::candle::Candle;
use crate::domain::signal::Signal;

/// Produces a directional signal for the newest bar.
///
/// `window` holds history up to and including the current candle, oldest
/// first. Implementations see nothing beyond it, so they cannot look ahead.
pub trait SignalSource {
    fn signal(&mut self, window: &[Candle]) -> Signal;
}
