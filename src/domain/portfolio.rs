//! Simulation account state and equity tracking.
//!
//! One `Portfolio` belongs to exactly one backtest run and is never shared.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Last computed account value: cash plus the open position at its mark.
    pub equity: f64,
    pub position: Option<Position>,
    pub last_exit_date: Option<NaiveDate>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            equity: initial_capital,
            position: None,
            last_exit_date: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Debit the position's cost basis and hold it. Refused while one is open.
    pub fn open_position(&mut self, position: Position) -> bool {
        if self.position.is_some() {
            return false;
        }
        self.cash -= position.cost_basis;
        self.position = Some(position);
        true
    }

    /// Release the open position, crediting back its cost basis plus `pnl`.
    pub fn close_position(&mut self, trade: Trade) -> Option<Position> {
        let position = self.position.take()?;
        self.cash += position.cost_basis + trade.pnl;
        self.equity = self.cash;
        self.last_exit_date = Some(trade.exit_date);
        self.trades.push(trade);
        Some(position)
    }

    pub fn mark_to_market(&mut self, date: NaiveDate, close: f64) {
        let held = self
            .position
            .as_ref()
            .map(|p| p.market_value(close))
            .unwrap_or(0.0);
        self.equity = self.cash + held;
        self.record_equity(date, self.equity);
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }

    /// Days since the last exit, if there was one.
    pub fn days_since_exit(&self, date: NaiveDate) -> Option<i64> {
        self.last_exit_date.map(|exit| (date - exit).num_days())
    }
}
