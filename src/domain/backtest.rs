//! Backtest engine and day loop.
//!
//! Each in-range day with a price bar runs three steps in a fixed order:
//! exit check, entry check, mark-to-market. A run owns its `Portfolio` and
//! shares nothing, so independent runs may execute in parallel.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{EvaluationError, SigtraderError};
use super::execution::{calc_pnl, pick_price};
use super::exit::{ExitReason, should_exit};
use super::metrics::BacktestStats;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{Position, Trade};
use super::price::{PriceBar, PriceSeries};
use super::query::HistoryQuery;
use super::scoring::Scorer;
use super::snapshot::AnalyticsSnapshot;
use super::strategy::Strategy;
use crate::ports::analytics_port::AnalyticsPort;
use crate::ports::price_port::PricePort;

/// Upper bound on history rows fetched for one run.
pub const HISTORY_LIMIT: usize = 4000;
/// Extra calendar days of prices kept past the end date for next-bar fills.
pub const PRICE_LOOKAHEAD_DAYS: u64 = 2;
/// Calendar days of history loaded before the run-once date.
pub const RUN_ONCE_LOOKBACK_DAYS: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_equity: f64,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), SigtraderError> {
        if self.end_date < self.start_date {
            return Err(SigtraderError::validation(
                "end_date must not be before start_date",
            ));
        }
        if !(self.initial_equity > 0.0) || !self.initial_equity.is_finite() {
            return Err(SigtraderError::validation(
                "initial_equity must be a positive number",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub stats: BacktestStats,
    /// Position still held when the last day was processed.
    pub open_position: Option<Position>,
}

/// Simulate `strategy` over `history`, pricing fills from `prices`.
///
/// The strategy and config are validated before the first day. Snapshots
/// outside the date range, and days with no price bar, are skipped.
pub fn run_backtest(
    strategy: &Strategy,
    config: &BacktestConfig,
    history: &[AnalyticsSnapshot],
    prices: &PriceSeries,
    scorer: &Scorer,
) -> Result<BacktestResult, SigtraderError> {
    strategy.validate()?;
    config.validate()?;

    let risk = &strategy.risk;
    if risk.max_positions > 1 {
        warn!(
            max_positions = risk.max_positions,
            "engine holds a single position; extra capacity is ignored"
        );
    }

    let mut days: Vec<&AnalyticsSnapshot> = history.iter().collect();
    days.sort_by_key(|s| s.trade_date);

    let mut portfolio = Portfolio::new(config.initial_equity);

    for snapshot in days {
        let date = snapshot.trade_date;
        if date < config.start_date || date > config.end_date {
            continue;
        }
        let Some(bar) = prices.get(date) else {
            debug!(symbol = %strategy.symbol, %date, "no price bar, skipping day");
            continue;
        };

        let day_start_equity = portfolio.equity;

        // 1. exit
        let exit = match portfolio.position.as_ref() {
            Some(position) => exit_decision(strategy, scorer, snapshot, position, bar)?,
            None => None,
        };
        if let Some(reason) = exit {
            close_position(&mut portfolio, strategy, prices, bar, reason);
        }

        // 2. entry
        if !portfolio.has_position()
            && !entry_blocked(&portfolio, strategy, date, day_start_equity)
            && strategy.entry_signal(scorer, snapshot)?
        {
            open_position(&mut portfolio, strategy, prices, bar);
        }

        // 3. mark-to-market
        portfolio.mark_to_market(date, bar.close);
    }

    let stats = BacktestStats::compute(
        &portfolio.trades,
        &portfolio.equity_curve,
        config.initial_equity,
    );
    info!(
        strategy = %strategy.name,
        symbol = %strategy.symbol,
        days = portfolio.equity_curve.len(),
        trades = stats.trade_count,
        total_return = stats.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        trades: portfolio.trades,
        equity_curve: portfolio.equity_curve,
        stats,
        open_position: portfolio.position,
    })
}

/// Hard stops are marked at the bar's close and ignore the minimum hold;
/// signal exits wait until the position has been held long enough.
fn exit_decision(
    strategy: &Strategy,
    scorer: &Scorer,
    snapshot: &AnalyticsSnapshot,
    position: &Position,
    bar: &PriceBar,
) -> Result<Option<ExitReason>, EvaluationError> {
    let held = position.hold_days(snapshot.trade_date);
    let reason = should_exit(scorer, snapshot, position, strategy, bar.close)?;
    Ok(reason.filter(|r| r.is_hard_stop() || held >= i64::from(strategy.risk.min_hold_days)))
}

fn entry_blocked(
    portfolio: &Portfolio,
    strategy: &Strategy,
    date: NaiveDate,
    day_start_equity: f64,
) -> bool {
    let risk = &strategy.risk;
    if risk.cooldown_days > 0 {
        if let Some(days) = portfolio.days_since_exit(date) {
            if days <= i64::from(risk.cooldown_days) {
                debug!(%date, days_since_exit = days, "entry blocked by cooldown");
                return true;
            }
        }
    }
    if let Some(limit) = risk.max_daily_loss_pct {
        if day_start_equity > 0.0 {
            let loss = (day_start_equity - portfolio.equity) / day_start_equity;
            if loss >= limit {
                debug!(%date, loss, "entry blocked by daily loss limit");
                return true;
            }
        }
    }
    false
}

fn close_position(
    portfolio: &mut Portfolio,
    strategy: &Strategy,
    prices: &PriceSeries,
    bar: &PriceBar,
    reason: ExitReason,
) {
    let Some(position) = portfolio.position.as_ref() else {
        return;
    };
    let risk = &strategy.risk;
    let exit_price = pick_price(risk.price_mode, prices, bar.date, bar.close);
    let (pnl, pnl_pct) = calc_pnl(
        position.entry_price,
        exit_price,
        position.quantity,
        risk.slippage_pct,
        risk.fees_pct,
    );
    let trade = Trade {
        symbol: strategy.symbol.clone(),
        entry_date: position.entry_date,
        entry_price: position.entry_price,
        exit_date: bar.date,
        exit_price,
        quantity: position.quantity,
        pnl,
        pnl_pct,
        hold_days: position.hold_days(bar.date),
        reason,
    };
    info!(
        symbol = %strategy.symbol,
        date = %bar.date,
        %reason,
        exit_price,
        pnl,
        "exit"
    );
    portfolio.close_position(trade);
}

fn open_position(
    portfolio: &mut Portfolio,
    strategy: &Strategy,
    prices: &PriceSeries,
    bar: &PriceBar,
) {
    let risk = &strategy.risk;
    let entry_price = pick_price(risk.price_mode, prices, bar.date, bar.close);
    let notional = risk.order_notional(portfolio.equity);
    if !(notional > 0.0) || !(entry_price > 0.0) {
        debug!(date = %bar.date, notional, entry_price, "entry skipped, nothing to buy");
        return;
    }
    let quantity = notional / entry_price;
    info!(
        symbol = %strategy.symbol,
        date = %bar.date,
        entry_price,
        quantity,
        "entry"
    );
    portfolio.open_position(Position::open(bar.date, entry_price, quantity));
}

/// Fetch everything a run over `[start, end]` needs for `symbol`.
///
/// History is successful rows only, sorted ascending. Prices extend a couple
/// of days past `end` so next-bar fills on the last day can resolve.
pub fn load_inputs(
    analytics: &dyn AnalyticsPort,
    prices: &dyn PricePort,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(Vec<AnalyticsSnapshot>, PriceSeries), SigtraderError> {
    let query = HistoryQuery::new(symbol)
        .between(start, end)
        .limit(HISTORY_LIMIT);
    let mut history = analytics.history(&query)?;
    if history.is_empty() {
        return Err(SigtraderError::NoData {
            symbol: symbol.to_string(),
        });
    }
    history.sort_by_key(|s| s.trade_date);

    let horizon = end
        .checked_add_days(Days::new(PRICE_LOOKAHEAD_DAYS))
        .unwrap_or(end);
    let bars: Vec<PriceBar> = prices
        .prices(symbol)?
        .into_iter()
        .filter(|bar| bar.date >= start && bar.date <= horizon)
        .collect();
    debug!(symbol, history = history.len(), bars = bars.len(), "inputs loaded");

    Ok((history, PriceSeries::new(bars)))
}

/// Where a live run's orders are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Paper,
    Real,
    Test,
}

impl FromStr for Environment {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paper" => Ok(Environment::Paper),
            "real" => Ok(Environment::Real),
            "test" => Ok(Environment::Test),
            other => Err(SigtraderError::validation(format!(
                "unknown environment '{}' (expected paper, real or test)",
                other
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Paper => "paper",
            Environment::Real => "real",
            Environment::Test => "test",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
}

/// A live trade record produced by a single-day run.
///
/// Exit fields are empty while the position is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy: String,
    pub symbol: String,
    pub env: Environment,
    pub side: Side,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExitReason>,
}

impl TradeRecord {
    fn closed(strategy: &Strategy, env: Environment, trade: &Trade) -> Self {
        TradeRecord {
            strategy: strategy.name.clone(),
            symbol: trade.symbol.clone(),
            env,
            side: Side::Buy,
            entry_date: trade.entry_date,
            entry_price: trade.entry_price,
            exit_date: Some(trade.exit_date),
            exit_price: Some(trade.exit_price),
            pnl: Some(trade.pnl),
            pnl_pct: Some(trade.pnl_pct),
            hold_days: Some(trade.hold_days),
            reason: Some(trade.reason),
        }
    }

    fn open(strategy: &Strategy, env: Environment, position: &Position) -> Self {
        TradeRecord {
            strategy: strategy.name.clone(),
            symbol: strategy.symbol.clone(),
            env,
            side: Side::Buy,
            entry_date: position.entry_date,
            entry_price: position.entry_price,
            exit_date: None,
            exit_price: None,
            pnl: None,
            pnl_pct: None,
            hold_days: None,
            reason: None,
        }
    }
}

/// Evaluate `strategy` for `today` alone and translate the outcome into live
/// trade records tagged with `env`.
///
/// A few days of history are loaded so the data source is exercised the same
/// way as a full run, but only `today` is simulated. The run's equity equals
/// one order's size value.
pub fn run_once(
    strategy: &Strategy,
    analytics: &dyn AnalyticsPort,
    prices: &dyn PricePort,
    scorer: &Scorer,
    today: NaiveDate,
    env: Environment,
) -> Result<Vec<TradeRecord>, SigtraderError> {
    let window_start = today
        .checked_sub_days(Days::new(RUN_ONCE_LOOKBACK_DAYS))
        .unwrap_or(today);
    let (history, series) = load_inputs(analytics, prices, &strategy.symbol, window_start, today)?;

    let config = BacktestConfig {
        start_date: today,
        end_date: today,
        initial_equity: strategy.risk.order_size_value,
    };
    let result = run_backtest(strategy, &config, &history, &series, scorer)?;

    let mut records: Vec<TradeRecord> = result
        .trades
        .iter()
        .map(|trade| TradeRecord::closed(strategy, env, trade))
        .collect();
    if let Some(position) = &result.open_position {
        records.push(TradeRecord::open(strategy, env, position));
    }
    info!(
        strategy = %strategy.name,
        %env,
        %today,
        records = records.len(),
        "run-once complete"
    );
    Ok(records)
}
