//! Forward-return study: how did the instrument move after each day the
//! strategy's entry signal fired?
//!
//! Alongside the per-horizon returns, a one-unit trade sequence is simulated
//! at snapshot closes: enter on a trigger while flat, leave when
//! [`should_exit`] fires, and close whatever is still open on the last day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::error::SigtraderError;
use super::exit::{ExitReason, should_exit};
use super::position::{Position, Trade};
use super::scoring::{ScoreBreakdown, Scorer};
use super::snapshot::AnalyticsSnapshot;
use super::strategy::{Signals, Strategy};

pub const DEFAULT_HORIZONS: [usize; 3] = [3, 5, 10];
/// Fraction of the close lost on a signal-driven exit in the simulated trades.
pub const SIMULATED_EXIT_COST: f64 = 0.001;

/// One trading day of the study.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardEvent {
    pub date: NaiveDate,
    pub close: f64,
    pub change_rate: f64,
    /// Entry rule breakdown; scoring strategies only.
    pub entry: Option<ScoreBreakdown>,
    pub exit_score: Option<f64>,
    pub triggered: bool,
    /// Horizon in trading days to `close[t+h] / close[t] - 1`. Filled for
    /// triggered days only.
    pub forward_returns: BTreeMap<usize, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonStats {
    pub horizon: usize,
    pub samples: usize,
    pub avg_return: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SimulationSummary {
    pub total_trades: usize,
    /// Product of `1 + pnl_pct` over the trades, minus one.
    pub total_return: f64,
    pub win_rate: f64,
}

impl SimulationSummary {
    pub fn from_trades(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return SimulationSummary::default();
        }
        let compounded = trades.iter().fold(1.0, |acc, t| acc * (1.0 + t.pnl_pct));
        let wins = trades.iter().filter(|t| t.is_win()).count();
        SimulationSummary {
            total_trades: trades.len(),
            total_return: compounded - 1.0,
            win_rate: wins as f64 / trades.len() as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardStudy {
    pub events: Vec<ForwardEvent>,
    pub triggered: usize,
    /// Horizons with at least one sample, ascending.
    pub stats: Vec<HorizonStats>,
    pub trades: Vec<Trade>,
    pub summary: SimulationSummary,
}

/// Run the study over `history` for the given horizons (defaults when empty,
/// zero horizons ignored).
pub fn run_forward_study(
    history: &[AnalyticsSnapshot],
    strategy: &Strategy,
    scorer: &Scorer,
    horizons: &[usize],
) -> Result<ForwardStudy, SigtraderError> {
    strategy.validate()?;

    let mut horizons: Vec<usize> = if horizons.is_empty() {
        DEFAULT_HORIZONS.to_vec()
    } else {
        horizons.iter().copied().filter(|h| *h > 0).collect()
    };
    horizons.sort_unstable();
    horizons.dedup();

    let mut days: Vec<&AnalyticsSnapshot> = history.iter().filter(|s| s.success).collect();
    days.sort_by_key(|s| s.trade_date);

    let mut samples: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    let mut events = Vec::with_capacity(days.len());
    let mut triggered_count = 0;
    let mut open: Option<Position> = None;
    let mut trades = Vec::new();

    for (idx, snapshot) in days.iter().enumerate() {
        let (entry, exit_score, triggered) = match &strategy.signals {
            Signals::Scoring(rules) => {
                let entry = scorer.breakdown(&rules.entry_rules, snapshot)?;
                let exit_score = if rules.exit_rules.is_empty() {
                    None
                } else {
                    Some(scorer.score(&rules.exit_rules, snapshot)?)
                };
                let triggered = entry.total >= rules.entry_threshold;
                (Some(entry), exit_score, triggered)
            }
            Signals::Conditions { .. } => (None, None, strategy.entry_signal(scorer, snapshot)?),
        };

        let mut forward_returns = BTreeMap::new();
        if triggered {
            triggered_count += 1;
            forward_returns = forward_returns_at(&days, idx, &horizons);
            for (h, r) in &forward_returns {
                samples.entry(*h).or_default().push(*r);
            }
        }

        events.push(ForwardEvent {
            date: snapshot.trade_date,
            close: snapshot.close,
            change_rate: snapshot.change_rate,
            entry,
            exit_score,
            triggered,
            forward_returns,
        });

        match open.take() {
            None => {
                if triggered && snapshot.close > 0.0 {
                    open = Some(Position::open(snapshot.trade_date, snapshot.close, 1.0));
                }
            }
            Some(position) => {
                match should_exit(scorer, snapshot, &position, strategy, snapshot.close)? {
                    Some(reason) => trades.push(simulated_trade(
                        strategy,
                        &position,
                        snapshot,
                        reason,
                        SIMULATED_EXIT_COST,
                    )),
                    None => open = Some(position),
                }
            }
        }
    }

    if let (Some(position), Some(last)) = (open, days.last()) {
        trades.push(simulated_trade(strategy, &position, last, ExitReason::EndOfData, 0.0));
    }
    let summary = SimulationSummary::from_trades(&trades);

    let stats: Vec<HorizonStats> = samples
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(horizon, values)| {
            let wins = values.iter().filter(|v| **v > 0.0).count();
            HorizonStats {
                horizon,
                samples: values.len(),
                avg_return: values.iter().sum::<f64>() / values.len() as f64,
                win_rate: wins as f64 / values.len() as f64,
            }
        })
        .collect();

    info!(
        strategy = %strategy.name,
        days = events.len(),
        triggered = triggered_count,
        trades = summary.total_trades,
        total_return = summary.total_return,
        "forward study complete"
    );

    Ok(ForwardStudy {
        events,
        triggered: triggered_count,
        stats,
        trades,
        summary,
    })
}

/// One-unit trade exited at `exit.close`; `exit_cost` is taken off the exit
/// price before P&L is computed.
fn simulated_trade(
    strategy: &Strategy,
    position: &Position,
    exit: &AnalyticsSnapshot,
    reason: ExitReason,
    exit_cost: f64,
) -> Trade {
    let net_exit = exit.close * (1.0 - exit_cost);
    Trade {
        symbol: strategy.symbol.clone(),
        entry_date: position.entry_date,
        entry_price: position.entry_price,
        exit_date: exit.trade_date,
        exit_price: exit.close,
        quantity: position.quantity,
        pnl: (net_exit - position.entry_price) * position.quantity,
        pnl_pct: net_exit / position.entry_price - 1.0,
        hold_days: position.hold_days(exit.trade_date),
        reason,
    }
}

fn forward_returns_at(
    days: &[&AnalyticsSnapshot],
    idx: usize,
    horizons: &[usize],
) -> BTreeMap<usize, f64> {
    let mut out = BTreeMap::new();
    let base = days[idx].close;
    if base <= 0.0 {
        return out;
    }
    for &h in horizons {
        if let Some(target) = days.get(idx + h) {
            if target.close > 0.0 {
                out.insert(h, target.close / base - 1.0);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::{Comparison, Condition, ConditionSet};
    use crate::domain::risk::RiskSettings;
    use crate::domain::scoring::{RuleKind, ScoringRule};
    use crate::domain::snapshot::NumericField;
    use crate::domain::strategy::ScoringRules;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn series(closes: &[(f64, f64)]) -> Vec<AnalyticsSnapshot> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &(close, score))| {
                let mut s = AnalyticsSnapshot::new("QQQ", date(1 + i as u32), close);
                s.score = score;
                s
            })
            .collect()
    }

    fn scoring_strategy() -> Strategy {
        Strategy {
            name: "fwd".into(),
            description: String::new(),
            symbol: "QQQ".into(),
            signals: Signals::Scoring(ScoringRules {
                entry_rules: vec![ScoringRule::new("BASE_SCORE", "", 1.0, RuleKind::Entry)],
                exit_rules: vec![ScoringRule::new("BASE_SCORE", "", 1.0, RuleKind::Exit)],
                entry_threshold: 70.0,
                exit_threshold: 40.0,
            }),
            risk: RiskSettings::default(),
        }
    }

    #[test]
    fn forward_returns_for_triggered_days() {
        let history = series(&[(100.0, 80.0), (102.0, 10.0), (110.0, 10.0), (90.0, 80.0)]);
        let study = run_forward_study(&history, &scoring_strategy(), &Scorer::default(), &[1, 2])
            .unwrap();

        assert_eq!(study.events.len(), 4);
        assert_eq!(study.triggered, 2);
        let first = &study.events[0];
        assert!(first.triggered);
        assert!((first.forward_returns[&1] - 0.02).abs() < 1e-9);
        assert!((first.forward_returns[&2] - 0.1).abs() < 1e-9);
        assert!((first.entry.as_ref().unwrap().total - 80.0).abs() < 1e-9);
        assert_eq!(first.exit_score, Some(80.0));

        // last day has no future
        assert!(study.events[3].triggered);
        assert!(study.events[3].forward_returns.is_empty());
        assert!(study.events[1].forward_returns.is_empty());

        assert_eq!(study.stats.len(), 2);
        assert_eq!(study.stats[0].horizon, 1);
        assert_eq!(study.stats[0].samples, 1);
        assert!((study.stats[0].win_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn simulated_trades_follow_exit_decisions() {
        let history = series(&[
            (100.0, 80.0), // enter
            (101.0, 80.0),
            (101.5, 20.0), // decay
            (100.0, 80.0), // enter
            (106.0, 80.0), // take profit
            (100.0, 80.0), // enter
            (99.0, 80.0),  // still open at the end
        ]);
        let study =
            run_forward_study(&history, &scoring_strategy(), &Scorer::default(), &[1]).unwrap();

        let reasons: Vec<ExitReason> = study.trades.iter().map(|t| t.reason).collect();
        assert_eq!(
            reasons,
            vec![ExitReason::SignalDecay, ExitReason::TakeProfit, ExitReason::EndOfData]
        );

        let decay = &study.trades[0];
        assert_eq!(decay.entry_date, date(1));
        assert_eq!(decay.exit_date, date(3));
        assert!((decay.exit_price - 101.5).abs() < 1e-9);
        assert!((decay.pnl_pct - (101.5 * 0.999 / 100.0 - 1.0)).abs() < 1e-12);

        let last = &study.trades[2];
        assert_eq!(last.entry_date, date(6));
        assert_eq!(last.exit_date, date(7));
        assert!((last.pnl_pct + 0.01).abs() < 1e-12);

        let expected = (101.5 * 0.999 / 100.0) * (106.0 * 0.999 / 100.0) * 0.99 - 1.0;
        assert_eq!(study.summary.total_trades, 3);
        assert!((study.summary.total_return - expected).abs() < 1e-12);
        assert!((study.summary.win_rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_trigger_means_no_trades() {
        let history = series(&[(100.0, 10.0), (101.0, 20.0)]);
        let study =
            run_forward_study(&history, &scoring_strategy(), &Scorer::default(), &[1]).unwrap();
        assert!(study.trades.is_empty());
        assert_eq!(study.summary, SimulationSummary::default());
    }

    #[test]
    fn default_horizons_when_empty() {
        let history = series(&[(100.0, 80.0), (101.0, 80.0), (102.0, 80.0), (103.0, 80.0)]);
        let study =
            run_forward_study(&history, &scoring_strategy(), &Scorer::default(), &[]).unwrap();
        assert_eq!(study.stats.len(), 1);
        assert_eq!(study.stats[0].horizon, 3);
        assert!((study.stats[0].avg_return - 0.03).abs() < 1e-9);
    }

    #[test]
    fn unsorted_history_and_failures() {
        let mut history = series(&[(100.0, 80.0), (120.0, 80.0)]);
        history.reverse();
        let mut failed = AnalyticsSnapshot::new("QQQ", date(2), 0.0);
        failed.success = false;
        history.push(failed);

        let study =
            run_forward_study(&history, &scoring_strategy(), &Scorer::default(), &[1]).unwrap();
        assert_eq!(study.events.len(), 2);
        assert_eq!(study.events[0].date, date(1));
        assert!((study.events[0].forward_returns[&1] - 0.2).abs() < 1e-9);
    }

    #[test]
    fn condition_strategy_has_no_scores() {
        let set = ConditionSet::all(vec![Condition::numeric(
            NumericField::Score,
            Comparison::Gte(50.0),
        )]);
        let strategy = Strategy {
            signals: Signals::Conditions {
                buy: set.clone(),
                sell: set,
            },
            ..scoring_strategy()
        };
        let history = series(&[(100.0, 60.0), (105.0, 10.0)]);
        let study = run_forward_study(&history, &strategy, &Scorer::default(), &[1]).unwrap();
        assert!(study.events[0].triggered);
        assert!(study.events[0].entry.is_none());
        assert!(!study.events[1].triggered);
    }
}
