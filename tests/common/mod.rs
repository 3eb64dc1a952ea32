#![allow(dead_code)]

use chrono::NaiveDate;
use sigtrader::adapters::memory_adapter::MemoryAdapter;
use sigtrader::domain::backtest::BacktestConfig;
use sigtrader::domain::condition::{Comparison, Condition, ConditionSet};
use sigtrader::domain::price::{PriceBar, PriceSeries};
use sigtrader::domain::risk::RiskSettings;
pub use sigtrader::domain::scoring::{RuleKind, Scorer, ScoringRule};
pub use sigtrader::domain::snapshot::{AnalyticsSnapshot, NumericField, Tag};
use sigtrader::domain::strategy::{ScoringRules, Signals, Strategy};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Consecutive calendar days from `start`.
pub fn day(start: &str, offset: u64) -> NaiveDate {
    date(start)
        .checked_add_days(chrono::Days::new(offset))
        .unwrap()
}

pub fn make_snapshot(symbol: &str, d: &str, close: f64, score: f64) -> AnalyticsSnapshot {
    let mut s = AnalyticsSnapshot::new(symbol, date(d), close);
    s.score = score;
    s
}

pub fn make_bar(symbol: &str, d: &str, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date: date(d),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000,
    }
}

pub fn make_bar_ohlc(symbol: &str, d: &str, open: f64, close: f64) -> PriceBar {
    PriceBar {
        open,
        high: open.max(close),
        low: open.min(close),
        ..make_bar(symbol, d, close)
    }
}

/// Snapshots and flat bars for `(close, score)` pairs on consecutive days.
pub fn make_series(
    symbol: &str,
    start: &str,
    points: &[(f64, f64)],
) -> (Vec<AnalyticsSnapshot>, PriceSeries) {
    let mut snapshots = Vec::with_capacity(points.len());
    let mut bars = Vec::with_capacity(points.len());
    for (i, &(close, score)) in points.iter().enumerate() {
        let d = day(start, i as u64);
        let mut s = AnalyticsSnapshot::new(symbol, d, close);
        s.score = score;
        snapshots.push(s);
        bars.push(PriceBar {
            symbol: symbol.to_string(),
            date: d,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        });
    }
    (snapshots, PriceSeries::new(bars))
}

pub fn score_gte(threshold: f64) -> ConditionSet {
    ConditionSet::all(vec![Condition::numeric(
        NumericField::Score,
        Comparison::Gte(threshold),
    )])
}

pub fn conditions_strategy(symbol: &str, buy: ConditionSet, sell: ConditionSet) -> Strategy {
    Strategy {
        name: "test-conditions".to_string(),
        description: String::new(),
        symbol: symbol.to_string(),
        signals: Signals::Conditions { buy, sell },
        risk: RiskSettings::frictionless(),
    }
}

pub fn scoring_strategy(
    symbol: &str,
    entry_rules: Vec<ScoringRule>,
    exit_rules: Vec<ScoringRule>,
    entry_threshold: f64,
    exit_threshold: f64,
) -> Strategy {
    Strategy {
        name: "test-scoring".to_string(),
        description: String::new(),
        symbol: symbol.to_string(),
        signals: Signals::Scoring(ScoringRules {
            entry_rules,
            exit_rules,
            entry_threshold,
            exit_threshold,
        }),
        risk: RiskSettings::frictionless(),
    }
}

pub fn base_score_rule(weight: f64, kind: RuleKind) -> ScoringRule {
    ScoringRule::new("BASE_SCORE", "", weight, kind)
}

pub fn make_config(start: &str, end: &str) -> BacktestConfig {
    BacktestConfig {
        start_date: date(start),
        end_date: date(end),
        initial_equity: 10_000.0,
    }
}

/// An in-memory data source holding `snapshots` and `bars`.
pub fn memory_store(snapshots: Vec<AnalyticsSnapshot>, bars: Vec<PriceBar>) -> MemoryAdapter {
    MemoryAdapter::new(snapshots, bars)
}
