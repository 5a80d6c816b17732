//! Position ledger: the single writer of balance and trade history.

use chrono::{DateTime, Utc};

use crate::domain::error::PerpbotError;
use crate::domain::position::{CloseReason, ClosedTrade, Position, Side};

/// One sample of account state, taken once per processed bar.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
    /// Signed open size at sample time: positive long, negative short, zero flat.
    pub position_size: f64,
}

/// Account state machine: flat -> open -> flat. No pyramiding, no hedging.
///
/// Balance only changes when a trade closes, by exactly its realized pnl.
/// Unrealized pnl is never folded in.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    symbol: String,
    balance: f64,
    position: Option<Position>,
    trades: Vec<ClosedTrade>,
    equity_curve: Vec<EquityPoint>,
}

impl PositionLedger {
    pub fn new(symbol: &str, initial_balance: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            balance: initial_balance,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Mutable access for the session's exit evaluation. Kept crate-private
    /// so outside callers can only read through [`Self::position`] and
    /// [`Self::snapshot`].
    pub(crate) fn position_mut(&mut self) -> Option<&mut Position> {
        self.position.as_mut()
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Clone for read-only observers outside the trading loop.
    pub fn snapshot(&self) -> PositionLedger {
        self.clone()
    }

    /// Open a new position. Rejected without side effect when one is open.
    pub fn open_position(
        &mut self,
        side: Side,
        entry_price: f64,
        size: f64,
        stop_loss: f64,
        take_profit: f64,
        opened_at: DateTime<Utc>,
    ) -> Result<(), PerpbotError> {
        if self.position.is_some() {
            return Err(PerpbotError::PositionAlreadyOpen {
                symbol: self.symbol.clone(),
            });
        }
        self.position = Some(Position {
            side,
            entry_price,
            size,
            stop_loss,
            take_profit,
            opened_at,
            trailing_stop: None,
        });
        Ok(())
    }

    /// Close the open position, realizing its pnl into the balance.
    ///
    /// A no-op returning `None` when flat, so exit checks can run
    /// unconditionally every bar.
    pub fn close_position(
        &mut self,
        exit_price: f64,
        reason: CloseReason,
        closed_at: DateTime<Utc>,
    ) -> Option<ClosedTrade> {
        let pos = self.position.take()?;
        let pnl = pos.unrealized_pnl(exit_price);
        let trade = ClosedTrade {
            side: pos.side,
            entry_price: pos.entry_price,
            exit_price,
            size: pos.size,
            stop_loss: pos.stop_loss,
            take_profit: pos.take_profit,
            trailing_stop: pos.trailing_stop,
            opened_at: pos.opened_at,
            closed_at,
            reason,
            pnl,
        };
        self.balance += pnl;
        self.trades.push(trade.clone());
        Some(trade)
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Utc>) {
        let position_size = self
            .position
            .as_ref()
            .map(|p| p.size * p.side.direction())
            .unwrap_or(0.0);
        self.equity_curve.push(EquityPoint {
            timestamp,
            balance: self.balance,
            position_size,
        });
    }
}
