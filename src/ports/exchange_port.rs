//! Exchange connectivity port trait.

use crate::domain::candle::Candle;
use crate::domain::error::PerpbotError;
use crate::domain::position::Side;

/// Order direction as sent to the venue. Opening a short and closing a long
/// are both `Sell`; the ledger tracks which is which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn to_open(side: Side) -> OrderSide {
        match side {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    pub fn to_close(side: Side) -> OrderSide {
        match side {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }
}

/// Port for the venue the session trades against.
///
/// `fetch_recent_candles` returning an empty vec means the feed is closed
/// and a live session should wind down.
pub trait ExchangePort {
    fn get_balance(&mut self) -> Result<f64, PerpbotError>;

    fn get_current_price(&mut self, symbol: &str) -> Result<f64, PerpbotError>;

    fn place_market_order(
        &mut self,
        symbol: &str,
        side: OrderSide,
        size: f64,
    ) -> Result<String, PerpbotError>;

    /// Signed net position held at the venue: positive long, negative short,
    /// zero when flat.
    fn get_open_position(&mut self, symbol: &str) -> Result<f64, PerpbotError>;

    fn fetch_recent_candles(
        &mut self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, PerpbotError>;
}
