//! The simulation's open position and the trades it turns into.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::exit::ExitReason;

/// Long-only holding; lives between a buy decision and the matching sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub quantity: f64,
    /// Cash debited at entry (`quantity * entry_price`).
    pub cost_basis: f64,
}

impl Position {
    pub fn open(entry_date: NaiveDate, entry_price: f64, quantity: f64) -> Self {
        Position {
            entry_date,
            entry_price,
            quantity,
            cost_basis: quantity * entry_price,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn hold_days(&self, date: NaiveDate) -> i64 {
        (date - self.entry_date).num_days()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub hold_days: i64,
    pub reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn open_sets_cost_basis() {
        let pos = Position::open(date(15), 50.0, 20.0);
        assert_eq!(pos.cost_basis, 1000.0);
        assert_eq!(pos.market_value(55.0), 1100.0);
    }

    #[test]
    fn hold_days_counts_calendar_days() {
        let pos = Position::open(date(15), 50.0, 1.0);
        assert_eq!(pos.hold_days(date(15)), 0);
        assert_eq!(pos.hold_days(date(22)), 7);
    }

    #[test]
    fn trade_win_flag() {
        let trade = Trade {
            symbol: "BHP".into(),
            entry_date: date(1),
            entry_price: 10.0,
            exit_date: date(2),
            exit_price: 10.0,
            quantity: 1.0,
            pnl: 0.0,
            pnl_pct: 0.0,
            hold_days: 1,
            reason: ExitReason::SellCondition,
        };
        assert!(!trade.is_win());
    }
}
