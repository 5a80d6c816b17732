//! Simulated exchange: instant fills at the mark price.

use crate::domain::candle::Candle;
use crate::domain::error::PerpbotError;
use crate::ports::exchange_port::{ExchangePort, OrderSide};

/// In-memory venue for backtests and paper-live runs.
///
/// Orders fill immediately at the current mark price. When constructed with
/// recorded candles it also acts as the candle feed, serving them in order
/// and returning an empty batch once exhausted so the session winds down.
pub struct PaperExchange {
    balance: f64,
    mark_price: f64,
    position: f64,
    avg_entry: f64,
    order_seq: u64,
    feed: Vec<Candle>,
    cursor: usize,
}

impl PaperExchange {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            mark_price: 0.0,
            position: 0.0,
            avg_entry: 0.0,
            order_seq: 0,
            feed: Vec::new(),
            cursor: 0,
        }
    }

    pub fn with_candles(balance: f64, candles: Vec<Candle>) -> Self {
        let mut exchange = Self::new(balance);
        exchange.feed = candles;
        exchange
    }

    pub fn set_mark_price(&mut self, price: f64) {
        self.mark_price = price;
    }

    /// Signed net position: positive long, negative short.
    pub fn position(&self) -> f64 {
        self.position
    }
}

impl ExchangePort for PaperExchange {
    fn get_balance(&mut self) -> Result<f64, PerpbotError> {
        Ok(self.balance)
    }

    fn get_current_price(&mut self, _symbol: &str) -> Result<f64, PerpbotError> {
        if self.mark_price <= 0.0 {
            return Err(PerpbotError::Exchange {
                reason: "no mark price yet".to_string(),
            });
        }
        Ok(self.mark_price)
    }

    fn place_market_order(
        &mut self,
        _symbol: &str,
        side: OrderSide,
        size: f64,
    ) -> Result<String, PerpbotError> {
        if size <= 0.0 || !size.is_finite() {
            return Err(PerpbotError::Exchange {
                reason: format!("invalid order size {size}"),
            });
        }
        if self.mark_price <= 0.0 {
            return Err(PerpbotError::Exchange {
                reason: "no mark price yet".to_string(),
            });
        }

        let signed = match side {
            OrderSide::Buy => size,
            OrderSide::Sell => -size,
        };

        let reduces = self.position != 0.0 && self.position.signum() != signed.signum();
        if reduces {
            let closed = signed.abs().min(self.position.abs());
            let pnl = (self.mark_price - self.avg_entry) * closed * self.position.signum();
            self.balance += pnl;
        } else if self.position == 0.0 {
            self.avg_entry = self.mark_price;
        }
        self.position += signed;
        if self.position == 0.0 {
            self.avg_entry = 0.0;
        }

        self.order_seq += 1;
        Ok(format!("paper-{}", self.order_seq))
    }

    fn get_open_position(&mut self, _symbol: &str) -> Result<f64, PerpbotError> {
        Ok(self.position)
    }

    fn fetch_recent_candles(
        &mut self,
        _symbol: &str,
        _timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, PerpbotError> {
        let remaining = self.feed.len() - self.cursor;
        let take = remaining.min(limit.max(1));
        let batch: Vec<Candle> = self.feed[self.cursor..self.cursor + take].to_vec();
        self.cursor += take;
        if let Some(last) = batch.last() {
            self.mark_price = last.close;
        }
        Ok(batch)
    }
}
