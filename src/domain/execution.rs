//! Fill price selection and trade P&L with slippage and fees.

use chrono::NaiveDate;

use crate::domain::price::PriceSeries;
use crate::domain::risk::PriceMode;

/// Fill price for an order decided on `date`.
///
/// Next-bar modes use the bar dated one calendar day later when it exists with
/// a positive price, and otherwise fall back to `current_close`.
pub fn pick_price(
    mode: PriceMode,
    prices: &PriceSeries,
    date: NaiveDate,
    current_close: f64,
) -> f64 {
    let next = match mode {
        PriceMode::CurrentClose => return current_close,
        PriceMode::NextOpen => prices.next_day(date).map(|bar| bar.open),
        PriceMode::NextClose => prices.next_day(date).map(|bar| bar.close),
    };
    match next {
        Some(price) if price > 0.0 => price,
        _ => current_close,
    }
}

/// Buy price after slippage.
pub fn apply_slippage_entry(price: f64, slippage_pct: f64) -> f64 {
    price * (1.0 + slippage_pct)
}

/// Sell price after slippage.
pub fn apply_slippage_exit(price: f64, slippage_pct: f64) -> f64 {
    price * (1.0 - slippage_pct)
}

/// Returns `(pnl, pnl_pct)` for a long round trip.
///
/// Fees are charged on both legs' slipped notional. Non-positive entry price
/// or quantity yields zero.
pub fn calc_pnl(
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
    slippage_pct: f64,
    fees_pct: f64,
) -> (f64, f64) {
    if entry_price <= 0.0 || quantity <= 0.0 {
        return (0.0, 0.0);
    }
    let entry_adj = apply_slippage_entry(entry_price, slippage_pct);
    let exit_adj = apply_slippage_exit(exit_price, slippage_pct);
    let gross = (exit_adj - entry_adj) * quantity;
    let fee = (entry_adj * quantity + exit_adj * quantity) * fees_pct;
    let pnl = gross - fee;
    let invested = entry_adj * quantity;
    let pnl_pct = if invested > 0.0 { pnl / invested } else { 0.0 };
    (pnl, pnl_pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PriceBar;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn series() -> PriceSeries {
        let bar = |d: u32, open: f64, close: f64| PriceBar {
            symbol: "SPY".into(),
            date: date(d),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 100,
        };
        PriceSeries::new(vec![bar(4, 100.0, 101.0), bar(5, 102.0, 103.0), bar(6, 0.0, 0.0)])
    }

    #[test]
    fn current_close_ignores_series() {
        assert_eq!(pick_price(PriceMode::CurrentClose, &series(), date(4), 101.0), 101.0);
    }

    #[test]
    fn next_open_and_next_close() {
        assert_eq!(pick_price(PriceMode::NextOpen, &series(), date(4), 101.0), 102.0);
        assert_eq!(pick_price(PriceMode::NextClose, &series(), date(4), 101.0), 103.0);
    }

    #[test]
    fn next_bar_missing_falls_back() {
        // 2024-03-07 has no bar
        assert_eq!(pick_price(PriceMode::NextOpen, &series(), date(6), 99.0), 99.0);
    }

    #[test]
    fn next_bar_non_positive_falls_back() {
        assert_eq!(pick_price(PriceMode::NextOpen, &series(), date(5), 103.0), 103.0);
    }

    #[test]
    fn pnl_without_costs() {
        let (pnl, pct) = calc_pnl(100.0, 110.0, 10.0, 0.0, 0.0);
        assert!((pnl - 100.0).abs() < 1e-9);
        assert!((pct - 0.1).abs() < 1e-9);
    }

    #[test]
    fn pnl_with_slippage_and_fees() {
        let (pnl, pct) = calc_pnl(100.0, 110.0, 10.0, 0.001, 0.001);
        let entry_adj = 100.1;
        let exit_adj = 109.89;
        let expected = (exit_adj - entry_adj) * 10.0 - (entry_adj * 10.0 + exit_adj * 10.0) * 0.001;
        assert!((pnl - expected).abs() < 1e-9);
        assert!((pct - expected / (entry_adj * 10.0)).abs() < 1e-9);
    }

    #[test]
    fn pnl_guards_degenerate_inputs() {
        assert_eq!(calc_pnl(0.0, 110.0, 10.0, 0.0, 0.0), (0.0, 0.0));
        assert_eq!(calc_pnl(100.0, 110.0, 0.0, 0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn slippage_moves_price_against_trader() {
        assert!(apply_slippage_entry(100.0, 0.01) > 100.0);
        assert!(apply_slippage_exit(100.0, 0.01) < 100.0);
    }
}
