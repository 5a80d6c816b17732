#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use perpbot::domain::candle::Candle;
use perpbot::domain::config::{SessionConfig, TpSlMode};
use perpbot::domain::error::PerpbotError;
use perpbot::domain::signal::Signal;
use perpbot::ports::exchange_port::{ExchangePort, OrderSide};
use perpbot::ports::notifier_port::{NotifierPort, NotifyEvent};
use perpbot::ports::signal_source::SignalSource;

pub fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hour as i64)
}

pub fn make_candle(hour: u32, close: f64) -> Candle {
    Candle {
        timestamp: ts(hour),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1000.0,
    }
}

pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_candle(i as u32, close))
        .collect()
}

pub fn sample_config() -> SessionConfig {
    SessionConfig {
        symbol: "BTCUSDT".to_string(),
        timeframe: "1h".to_string(),
        initial_balance: 10_000.0,
        risk_per_trade: 0.01,
        max_position_size: 1_000.0,
        leverage: 1.0,
        tp_sl_mode: TpSlMode::Percentage,
        sl_multiplier: 0.05,
        tp_multiplier: 0.10,
        atr_period: 14,
        use_trailing_stop: false,
        trailing_stop_activation: 0.01,
        trailing_stop_distance: 0.005,
        warmup_bars: 0,
        poll_interval_secs: 1,
        status_interval_secs: 600,
        order_retry_count: 3,
        order_retry_delay_secs: 0,
    }
}

/// Replays a fixed signal script, one entry per evaluated bar.
pub struct ScriptedSignals {
    script: Vec<Signal>,
    index: usize,
}

impl ScriptedSignals {
    pub fn new(script: Vec<Signal>) -> Self {
        Self { script, index: 0 }
    }
}

impl SignalSource for ScriptedSignals {
    fn signal(&mut self, _window: &[Candle]) -> Signal {
        let signal = self.script.get(self.index).copied().unwrap_or(Signal::Flat);
        self.index += 1;
        signal
    }
}

/// Accepts every order and records it; optionally fails the first N attempts
/// or serves a scripted candle feed for live-loop tests.
pub struct MockExchange {
    pub orders: Arc<Mutex<Vec<(OrderSide, f64)>>>,
    pub fail_first: Arc<AtomicUsize>,
    feed: Vec<Vec<Candle>>,
    feed_index: usize,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(Mutex::new(Vec::new())),
            fail_first: Arc::new(AtomicUsize::new(0)),
            feed: Vec::new(),
            feed_index: 0,
        }
    }

    /// Fail this many order attempts before accepting again.
    pub fn failing(attempts: usize) -> Self {
        let exchange = Self::new();
        exchange.fail_first.store(attempts, Ordering::SeqCst);
        exchange
    }

    /// Serve these batches from `fetch_recent_candles`, then report closure.
    pub fn with_feed(mut self, batches: Vec<Vec<Candle>>) -> Self {
        self.feed = batches;
        self
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

impl ExchangePort for MockExchange {
    fn get_balance(&mut self) -> Result<f64, PerpbotError> {
        Ok(10_000.0)
    }

    fn get_current_price(&mut self, _symbol: &str) -> Result<f64, PerpbotError> {
        Ok(100.0)
    }

    fn place_market_order(
        &mut self,
        _symbol: &str,
        side: OrderSide,
        size: f64,
    ) -> Result<String, PerpbotError> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(PerpbotError::Exchange {
                reason: "simulated outage".to_string(),
            });
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push((side, size));
        Ok(format!("mock-{}", orders.len()))
    }

    fn get_open_position(&mut self, _symbol: &str) -> Result<f64, PerpbotError> {
        let net = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .map(|(side, size)| match side {
                OrderSide::Buy => *size,
                OrderSide::Sell => -size,
            })
            .sum();
        Ok(net)
    }

    fn fetch_recent_candles(
        &mut self,
        _symbol: &str,
        _timeframe: &str,
        _limit: usize,
    ) -> Result<Vec<Candle>, PerpbotError> {
        let batch = self.feed.get(self.feed_index).cloned().unwrap_or_default();
        self.feed_index += 1;
        Ok(batch)
    }
}

/// Records every event so tests can assert on notification behavior.
pub struct RecordingNotifier {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl NotifierPort for RecordingNotifier {
    fn notify(&self, event: &NotifyEvent) {
        let label = match event {
            NotifyEvent::TradeOpened { .. } => "opened".to_string(),
            NotifyEvent::TradeClosed { trade, .. } => format!("closed:{}", trade.reason),
            NotifyEvent::Error { context, .. } => format!("error:{context}"),
            NotifyEvent::Status { .. } => "status".to_string(),
        };
        self.events.lock().unwrap().push(label);
    }
}
