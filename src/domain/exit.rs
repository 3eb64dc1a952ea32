//! Exit decisions for an open position.
//!
//! Checks run in a fixed order and the first hit wins: stop-loss,
//! take-profit, signal decay, then the strategy's own sell signal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::condition::EmptyPolicy;
use crate::domain::condition_eval::evaluate;
use crate::domain::error::EvaluationError;
use crate::domain::position::Position;
use crate::domain::scoring::Scorer;
use crate::domain::snapshot::AnalyticsSnapshot;
use crate::domain::strategy::{Signals, Strategy};

/// Entry score below this fraction of the entry threshold means the signal has decayed.
pub const DECAY_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SellCondition,
    SignalDecay,
    /// Still open when the data ran out; only the forward study closes these.
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::SellCondition => "sell_condition",
            ExitReason::SignalDecay => "signal_decay",
            ExitReason::EndOfData => "end_of_data",
        }
    }

    pub fn is_hard_stop(&self) -> bool {
        matches!(self, ExitReason::StopLoss | ExitReason::TakeProfit)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stop-loss or take-profit breach of `mark_price` relative to `entry_price`.
///
/// The stop-loss magnitude is used regardless of sign.
pub fn hard_stop(
    entry_price: f64,
    mark_price: f64,
    stop_loss_pct: Option<f64>,
    take_profit_pct: Option<f64>,
) -> Option<ExitReason> {
    if entry_price <= 0.0 {
        return None;
    }
    let change = (mark_price - entry_price) / entry_price;
    if stop_loss_pct.is_some_and(|sl| change <= -sl.abs()) {
        return Some(ExitReason::StopLoss);
    }
    if take_profit_pct.is_some_and(|tp| change >= tp) {
        return Some(ExitReason::TakeProfit);
    }
    None
}

/// Signal-driven exit, ignoring hard stops.
pub fn signal_exit(
    scorer: &Scorer,
    snapshot: &AnalyticsSnapshot,
    strategy: &Strategy,
) -> Result<Option<ExitReason>, EvaluationError> {
    match &strategy.signals {
        Signals::Conditions { sell, .. } => {
            if evaluate(snapshot, sell, EmptyPolicy::MatchNone) {
                Ok(Some(ExitReason::SellCondition))
            } else {
                Ok(None)
            }
        }
        Signals::Scoring(rules) => {
            let entry_score = scorer.score(&rules.entry_rules, snapshot)?;
            if entry_score < rules.entry_threshold * DECAY_FRACTION {
                return Ok(Some(ExitReason::SignalDecay));
            }
            if scorer.is_exit_triggered(&rules.exit_rules, rules.exit_threshold, snapshot)? {
                return Ok(Some(ExitReason::SellCondition));
            }
            Ok(None)
        }
    }
}

/// Full exit decision for `position` against today's snapshot, with hard
/// stops judged at `mark_price`.
pub fn should_exit(
    scorer: &Scorer,
    snapshot: &AnalyticsSnapshot,
    position: &Position,
    strategy: &Strategy,
    mark_price: f64,
) -> Result<Option<ExitReason>, EvaluationError> {
    let (stop_loss, take_profit) = strategy.hard_stops();
    if let Some(reason) = hard_stop(position.entry_price, mark_price, stop_loss, take_profit) {
        return Ok(Some(reason));
    }
    signal_exit(scorer, snapshot, strategy)
}
