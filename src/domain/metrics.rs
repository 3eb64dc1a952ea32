//! Summary statistics derived once a run has finished.

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::position::Trade;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestStats {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub win_rate: f64,
    /// Mean P&L of winning trades.
    pub avg_gain: f64,
    /// Mean P&L of losing trades, negative.
    pub avg_loss: f64,
    /// Gross gains over gross losses; `None` when nothing lost.
    pub profit_factor: Option<f64>,
    pub avg_hold_days: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl BacktestStats {
    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], initial_capital: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            final_equity / initial_capital - 1.0
        } else {
            0.0
        };

        let max_drawdown = compute_drawdown(equity_curve, initial_capital);

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut total_gains = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_hold_days = 0i64;

        for trade in trades {
            let pnl = trade.pnl;
            if trade.is_win() {
                wins += 1;
                total_gains += pnl;
                if pnl > largest_win {
                    largest_win = pnl;
                }
            } else if pnl < 0.0 {
                losses += 1;
                total_losses += pnl;
                if pnl < largest_loss {
                    largest_loss = pnl;
                }
            }
            total_hold_days += trade.hold_days;
        }

        let trade_count = trades.len();
        let win_rate = if trade_count > 0 {
            wins as f64 / trade_count as f64
        } else {
            0.0
        };
        let avg_gain = if wins > 0 {
            total_gains / wins as f64
        } else {
            0.0
        };
        let avg_loss = if losses > 0 {
            total_losses / losses as f64
        } else {
            0.0
        };
        let profit_factor = if losses > 0 && total_losses < 0.0 {
            Some(total_gains / total_losses.abs())
        } else {
            None
        };
        let avg_hold_days = if trade_count > 0 {
            total_hold_days as f64 / trade_count as f64
        } else {
            0.0
        };

        BacktestStats {
            total_return,
            max_drawdown,
            trade_count,
            win_rate,
            avg_gain,
            avg_loss,
            profit_factor,
            avg_hold_days,
            largest_win,
            largest_loss,
        }
    }
}

/// Largest peak-to-trough decline as a fraction of the peak.
///
/// The running peak starts at the initial capital, so a curve that only
/// falls still reports its drawdown from the starting balance.
fn compute_drawdown(equity_curve: &[EquityPoint], initial_capital: f64) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
