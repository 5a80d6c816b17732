//! EMA crossover signal source.
//!
//! k = 2/(n+1), seeded with the first SMA. Long while the fast EMA sits
//! above the slow one, short while below. Onset detection is left to the
//! session's debouncing, so a sustained trend fires a single entry.

use crate::domain::candle::Candle;
use crate::domain::signal::Signal;
use crate::ports::signal_source::SignalSource;

#[derive(Debug)]
pub struct EmaCrossSignal {
    fast_period: usize,
    slow_period: usize,
}

impl EmaCrossSignal {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
        }
    }
}

impl SignalSource for EmaCrossSignal {
    fn signal(&mut self, window: &[Candle]) -> Signal {
        let (Some(fast), Some(slow)) = (
            ema(window, self.fast_period),
            ema(window, self.slow_period),
        ) else {
            return Signal::Flat;
        };

        if fast > slow {
            Signal::Long
        } else if fast < slow {
            Signal::Short
        } else {
            Signal::Flat
        }
    }
}

/// Final EMA value over the window, or `None` during warmup.
fn ema(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed: f64 = candles[..period].iter().map(|c| c.close).sum::<f64>() / period as f64;

    let mut value = seed;
    for candle in &candles[period..] {
        value = candle.close * k + value * (1.0 - k);
    }
    Some(value)
}
