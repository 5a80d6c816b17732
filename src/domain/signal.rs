//! Directional signals and debouncing.

/// Direction requested by a strategy for the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Long,
    Short,
    Flat,
}

/// Suppresses repeats so a sustained signal fires once at its onset.
///
/// A raw signal equal to the immediately preceding raw signal becomes `Flat`;
/// any change of raw value passes through. `Flat` itself never fires.
#[derive(Debug, Default)]
pub struct SignalDebouncer {
    previous: Option<Signal>,
}

impl SignalDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debounce(&mut self, raw: Signal) -> Signal {
        let effective = match self.previous {
            Some(prev) if prev == raw => Signal::Flat,
            _ => raw,
        };
        self.previous = Some(raw);
        effective
    }
}
