//! Notifier adapter that renders events through the log facade.

use crate::ports::notifier_port::{NotifierPort, NotifyEvent};

/// Default notifier: trade events at info, failures at error.
pub struct LogNotifier;

impl NotifierPort for LogNotifier {
    fn notify(&self, event: &NotifyEvent) {
        match event {
            NotifyEvent::TradeOpened { symbol, position } => {
                log::info!(
                    "[{symbol}] opened {} {:.6} @ {:.2} (sl {:.2}, tp {:.2})",
                    position.side,
                    position.size,
                    position.entry_price,
                    position.stop_loss,
                    position.take_profit,
                );
            }
            NotifyEvent::TradeClosed {
                symbol,
                trade,
                balance,
            } => {
                log::info!(
                    "[{symbol}] closed {} {:.6} @ {:.2} ({}), pnl {:+.2}, balance {:.2}",
                    trade.side,
                    trade.size,
                    trade.exit_price,
                    trade.reason,
                    trade.pnl,
                    balance,
                );
            }
            NotifyEvent::Error { context, message } => {
                log::error!("[{context}] {message}");
            }
            NotifyEvent::Status {
                symbol,
                balance,
                open_position,
                mark_price,
            } => match (open_position, mark_price) {
                (Some(pos), Some(price)) => log::info!(
                    "[{symbol}] status: balance {balance:.2}, {} {:.6} open, unrealized {:+.2}",
                    pos.side,
                    pos.size,
                    pos.unrealized_pnl(*price),
                ),
                (Some(pos), None) => log::info!(
                    "[{symbol}] status: balance {balance:.2}, {} {:.6} open",
                    pos.side,
                    pos.size,
                ),
                (None, _) => log::info!("[{symbol}] status: balance {balance:.2}, flat"),
            },
        }
    }
}
