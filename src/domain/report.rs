//! Session performance aggregation.

use crate::domain::ledger::EquityPoint;
use crate::domain::position::ClosedTrade;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub avg_trade_pnl: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
}

impl PerformanceReport {
    pub fn compute(
        initial_balance: f64,
        trades: &[ClosedTrade],
        equity_curve: &[EquityPoint],
    ) -> Self {
        let final_balance = equity_curve
            .last()
            .map(|p| p.balance)
            .unwrap_or(initial_balance);

        let total_return = if initial_balance > 0.0 {
            (final_balance - initial_balance) / initial_balance
        } else {
            0.0
        };

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut best_trade = 0.0_f64;
        let mut worst_trade = 0.0_f64;
        let mut pnl_sum = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            pnl_sum += pnl;
            if pnl > 0.0 {
                winning_trades += 1;
                total_wins += pnl;
            } else if pnl < 0.0 {
                losing_trades += 1;
                total_losses += pnl.abs();
            }
            if pnl > best_trade {
                best_trade = pnl;
            }
            if pnl < worst_trade {
                worst_trade = pnl;
            }
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_trade_pnl = if total_trades > 0 {
            pnl_sum / total_trades as f64
        } else {
            0.0
        };

        PerformanceReport {
            initial_balance,
            final_balance,
            total_return,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            profit_factor,
            max_drawdown: compute_drawdown(equity_curve),
            sharpe_ratio: compute_sharpe(equity_curve),
            avg_trade_pnl,
            best_trade,
            worst_trade,
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }

    let mut peak = equity_curve[0].balance;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.balance > peak {
            peak = point.balance;
        } else if peak > 0.0 {
            let dd = (peak - point.balance) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

/// Mean over population standard deviation of per-bar balance returns.
fn compute_sharpe(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].balance;
            let curr = w[1].balance;
            if prev > 0.0 { (curr - prev) / prev } else { 0.0 }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 { mean / stddev } else { 0.0 }
}
