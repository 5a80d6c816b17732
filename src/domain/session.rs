//! Trading session orchestration for backtest and live modes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::domain::candle::{Candle, average_true_range};
use crate::domain::config::{SessionConfig, TpSlMode};
use crate::domain::error::PerpbotError;
use crate::domain::exit_policy::{evaluate_exit, protective_levels, signal_flip};
use crate::domain::ledger::PositionLedger;
use crate::domain::position::Side;
use crate::domain::report::PerformanceReport;
use crate::domain::signal::{Signal, SignalDebouncer};
use crate::domain::sizing::position_size;
use crate::ports::exchange_port::{ExchangePort, OrderSide};
use crate::ports::notifier_port::{NotifierPort, NotifyEvent};
use crate::ports::signal_source::SignalSource;

/// Bars of history retained for signal evaluation and ATR.
const HISTORY_CAP: usize = 1000;

/// Candles requested per live poll.
const FETCH_LIMIT: usize = 100;

/// Drives one symbol through the entry/exit cycle.
///
/// The same per-candle path runs in both modes; only the candle source and
/// the pacing differ. All ledger mutation happens on the session's own loop,
/// so observers read through [`PositionLedger::snapshot`].
pub struct TradingSession {
    config: SessionConfig,
    ledger: PositionLedger,
    signal_source: Box<dyn SignalSource>,
    exchange: Box<dyn ExchangePort>,
    notifier: Box<dyn NotifierPort>,
    debouncer: SignalDebouncer,
    history: Vec<Candle>,
    last_timestamp: Option<DateTime<Utc>>,
    stop: Arc<AtomicBool>,
    live: bool,
}

impl TradingSession {
    pub fn new(
        config: SessionConfig,
        signal_source: Box<dyn SignalSource>,
        exchange: Box<dyn ExchangePort>,
        notifier: Box<dyn NotifierPort>,
    ) -> Self {
        let ledger = PositionLedger::new(&config.symbol, config.initial_balance);
        Self {
            config,
            ledger,
            signal_source,
            exchange,
            notifier,
            debouncer: SignalDebouncer::new(),
            history: Vec::new(),
            last_timestamp: None,
            stop: Arc::new(AtomicBool::new(false)),
            live: false,
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    /// Flag observers can set to wind the live loop down cooperatively.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Replay recorded candles. Bad bars are logged and skipped; the replay
    /// always completes and reports.
    pub fn run_backtest(&mut self, candles: &[Candle]) -> PerformanceReport {
        self.live = false;
        log::info!(
            "backtest start: {} over {} candles, balance {:.2}",
            self.config.symbol,
            candles.len(),
            self.ledger.balance()
        );

        for candle in candles {
            if let Err(e) = self.process_candle(candle) {
                log::warn!("skipping bar at {}: {e}", candle.timestamp);
            }
        }

        let report = self.report();
        log::info!(
            "backtest done: {} trades, final balance {:.2}",
            report.total_trades,
            report.final_balance
        );
        report
    }

    /// Poll the exchange until cancelled or the feed closes.
    ///
    /// Only candles newer than the last processed timestamp are handled, so
    /// re-fetching an overlapping window never double-trades a bar.
    pub fn run_live(&mut self) -> Result<PerformanceReport, PerpbotError> {
        self.live = true;
        self.seed_history()?;
        self.reconcile_venue_position();
        log::info!(
            "live session start: {} on {} ({} seeded bars)",
            self.config.symbol,
            self.config.timeframe,
            self.history.len()
        );

        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        let status_interval = Duration::from_secs(self.config.status_interval_secs);
        let mut last_status = Instant::now();

        loop {
            if self.stop.load(Ordering::Relaxed) {
                log::info!("stop requested, ending live session");
                break;
            }

            match self.exchange.fetch_recent_candles(
                &self.config.symbol,
                &self.config.timeframe,
                FETCH_LIMIT,
            ) {
                Ok(candles) if candles.is_empty() => {
                    log::info!("candle feed closed, ending live session");
                    break;
                }
                Ok(candles) => {
                    for candle in &candles {
                        if !self.is_new_bar(candle) {
                            continue;
                        }
                        if let Err(e) = self.process_candle(candle) {
                            log::warn!("skipping bar at {}: {e}", candle.timestamp);
                            self.notifier.notify(&NotifyEvent::Error {
                                context: "process_candle".to_string(),
                                message: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    log::error!("candle fetch failed: {e}");
                    self.notifier.notify(&NotifyEvent::Error {
                        context: "fetch_recent_candles".to_string(),
                        message: e.to_string(),
                    });
                }
            }

            if last_status.elapsed() >= status_interval {
                self.emit_status();
                last_status = Instant::now();
            }

            std::thread::sleep(poll_interval);
        }

        Ok(self.report())
    }

    pub fn report(&self) -> PerformanceReport {
        PerformanceReport::compute(
            self.config.initial_balance,
            self.ledger.trades(),
            self.ledger.equity_curve(),
        )
    }

    /// One full bar cycle: validate, signal, entries, exits, equity sample.
    fn process_candle(&mut self, candle: &Candle) -> Result<(), PerpbotError> {
        if !candle.is_valid() {
            return Err(PerpbotError::Data {
                source_name: "candle".to_string(),
                reason: "malformed candle".to_string(),
            });
        }
        if let Some(last) = self.last_timestamp {
            if candle.timestamp <= last {
                return Err(PerpbotError::Data {
                    source_name: "candle".to_string(),
                    reason: format!("non-increasing timestamp {} <= {last}", candle.timestamp),
                });
            }
        }
        self.last_timestamp = Some(candle.timestamp);

        self.history.push(candle.clone());
        if self.history.len() > HISTORY_CAP {
            self.history.remove(0);
        }

        if self.history.len() <= self.config.warmup_bars {
            self.ledger.record_equity(candle.timestamp);
            return Ok(());
        }

        let raw = self.signal_source.signal(&self.history);
        let effective = self.debouncer.debounce(raw);

        let result = if self.ledger.is_flat() {
            self.try_enter(candle, effective)
        } else {
            self.try_exit(candle, effective)
        };

        self.ledger.record_equity(candle.timestamp);
        result
    }

    fn try_enter(&mut self, candle: &Candle, effective: Signal) -> Result<(), PerpbotError> {
        let side = match effective {
            Signal::Long => Side::Long,
            Signal::Short => Side::Short,
            Signal::Flat => return Ok(()),
        };

        let entry_price = candle.close;
        let atr = match self.config.tp_sl_mode {
            TpSlMode::Atr => average_true_range(&self.history, self.config.atr_period),
            TpSlMode::Percentage => None,
        };
        let (stop_loss, take_profit) =
            protective_levels(&self.config, side, entry_price, atr)?;

        let size = position_size(
            self.ledger.balance(),
            self.config.risk_per_trade,
            entry_price,
            stop_loss,
            self.config.leverage,
            self.config.max_position_size,
        )?;
        if size <= 0.0 {
            log::debug!("computed size is zero, skipping entry");
            return Ok(());
        }

        // No ledger mutation until the venue has confirmed the fill.
        let order_id = self.place_order_with_retry(OrderSide::to_open(side), size)?;

        self.ledger.open_position(
            side,
            entry_price,
            size,
            stop_loss,
            take_profit,
            candle.timestamp,
        )?;

        log::info!(
            "opened {side} {:.6} {} @ {entry_price:.2} (sl {stop_loss:.2}, tp {take_profit:.2}, order {order_id})",
            size,
            self.config.symbol,
        );
        if let Some(position) = self.ledger.position() {
            self.notifier.notify(&NotifyEvent::TradeOpened {
                symbol: self.config.symbol.clone(),
                position: position.clone(),
            });
        }
        Ok(())
    }

    fn try_exit(&mut self, candle: &Candle, effective: Signal) -> Result<(), PerpbotError> {
        let price = candle.close;

        let Some(position) = self.ledger.position_mut() else {
            return Ok(());
        };
        let reason = evaluate_exit(&self.config, position, price)
            .or_else(|| signal_flip(position, effective));

        let Some(reason) = reason else {
            return Ok(());
        };
        let (side, size) = (position.side, position.size);

        self.place_order_with_retry(OrderSide::to_close(side), size)?;

        if let Some(trade) = self.ledger.close_position(price, reason, candle.timestamp) {
            log::info!(
                "closed {} {} @ {price:.2} ({reason}, pnl {:.2}, balance {:.2})",
                trade.side,
                self.config.symbol,
                trade.pnl,
                self.ledger.balance()
            );
            self.notifier.notify(&NotifyEvent::TradeClosed {
                symbol: self.config.symbol.clone(),
                trade,
                balance: self.ledger.balance(),
            });
        }
        Ok(())
    }

    /// Bounded retry around order placement. On exhaustion the caller sees
    /// the final error and the ledger has not been touched.
    fn place_order_with_retry(
        &mut self,
        side: OrderSide,
        size: f64,
    ) -> Result<String, PerpbotError> {
        let attempts = self.config.order_retry_count.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self
                .exchange
                .place_market_order(&self.config.symbol, side, size)
            {
                Ok(order_id) => return Ok(order_id),
                Err(e) => {
                    log::warn!("order attempt {attempt}/{attempts} failed: {e}");
                    last_err = Some(e);
                    if self.live && attempt < attempts {
                        std::thread::sleep(Duration::from_secs(
                            self.config.order_retry_delay_secs,
                        ));
                    }
                }
            }
        }

        let err = last_err.unwrap_or_else(|| PerpbotError::Exchange {
            reason: "order placement failed".to_string(),
        });
        self.notifier.notify(&NotifyEvent::Error {
            context: "place_market_order".to_string(),
            message: err.to_string(),
        });
        Err(err)
    }

    fn seed_history(&mut self) -> Result<(), PerpbotError> {
        let seed = self.exchange.fetch_recent_candles(
            &self.config.symbol,
            &self.config.timeframe,
            FETCH_LIMIT,
        )?;
        for candle in seed {
            if candle.is_valid() && self.is_new_bar(&candle) {
                self.last_timestamp = Some(candle.timestamp);
                self.history.push(candle);
            }
        }
        Ok(())
    }

    /// Warn when the venue already holds exposure this session is not
    /// tracking. The session never adopts it; it trades only what it opens.
    fn reconcile_venue_position(&mut self) {
        match self.exchange.get_open_position(&self.config.symbol) {
            Ok(venue) if venue != 0.0 && self.ledger.is_flat() => {
                log::warn!(
                    "venue reports an untracked position of {venue:.6} {}",
                    self.config.symbol
                );
                self.notifier.notify(&NotifyEvent::Error {
                    context: "reconcile".to_string(),
                    message: format!("untracked venue position of {venue:.6}"),
                });
            }
            Ok(_) => {}
            Err(e) => log::warn!("venue position check failed: {e}"),
        }
    }

    fn is_new_bar(&self, candle: &Candle) -> bool {
        match self.last_timestamp {
            Some(last) => candle.timestamp > last,
            None => true,
        }
    }

    fn emit_status(&mut self) {
        let mark_price = self
            .exchange
            .get_current_price(&self.config.symbol)
            .map_err(|e| log::warn!("status price fetch failed: {e}"))
            .ok();
        self.notifier.notify(&NotifyEvent::Status {
            symbol: self.config.symbol.clone(),
            balance: self.ledger.balance(),
            open_position: self.ledger.position().cloned(),
            mark_price,
        });
    }
}
