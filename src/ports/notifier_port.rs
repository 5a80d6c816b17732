//! Notification port trait.

use crate::domain::position::{ClosedTrade, Position};

/// Events the session reports as it trades.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    TradeOpened { symbol: String, position: Position },
    TradeClosed { symbol: String, trade: ClosedTrade, balance: f64 },
    Error { context: String, message: String },
    Status {
        symbol: String,
        balance: f64,
        open_position: Option<Position>,
        mark_price: Option<f64>,
    },
}

/// Fire-and-forget delivery; a notifier must never abort trading.
pub trait NotifierPort {
    fn notify(&self, event: &NotifyEvent);
}
