//! Strategy definition.
//!
//! A strategy trades one symbol. Its signals come either from buy/sell
//! condition sets or from weighted entry/exit rule lists with thresholds.

use crate::domain::condition::{ConditionSet, EmptyPolicy};
use crate::domain::condition_eval::evaluate;
use crate::domain::error::{EvaluationError, SigtraderError};
use crate::domain::risk::{DEFAULT_STOP_LOSS_PCT, DEFAULT_TAKE_PROFIT_PCT, RiskSettings};
use crate::domain::scoring::{ScoringRule, Scorer};
use crate::domain::snapshot::AnalyticsSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRules {
    pub entry_rules: Vec<ScoringRule>,
    pub exit_rules: Vec<ScoringRule>,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signals {
    Conditions { buy: ConditionSet, sell: ConditionSet },
    Scoring(ScoringRules),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub description: String,
    pub symbol: String,
    pub signals: Signals,
    pub risk: RiskSettings,
}

impl Strategy {
    pub fn validate(&self) -> Result<(), SigtraderError> {
        if self.name.trim().is_empty() {
            return Err(SigtraderError::validation("strategy name is required"));
        }
        if self.symbol.trim().is_empty() {
            return Err(SigtraderError::validation("strategy symbol is required"));
        }

        match &self.signals {
            Signals::Conditions { buy, sell } => {
                if buy.is_empty() {
                    return Err(SigtraderError::validation(
                        "buy conditions require at least one condition",
                    ));
                }
                if sell.is_empty() {
                    return Err(SigtraderError::validation(
                        "sell conditions require at least one condition",
                    ));
                }
                buy.validate().map_err(|e| prefix("buy conditions", e))?;
                sell.validate().map_err(|e| prefix("sell conditions", e))?;
            }
            Signals::Scoring(rules) => {
                if rules.entry_rules.is_empty() {
                    return Err(SigtraderError::validation(
                        "scoring strategy requires at least one entry rule",
                    ));
                }
                if !rules.entry_threshold.is_finite() || !rules.exit_threshold.is_finite() {
                    return Err(SigtraderError::validation("thresholds must be finite"));
                }
                for rule in rules.entry_rules.iter().chain(&rules.exit_rules) {
                    if rule.condition_type.trim().is_empty() {
                        return Err(SigtraderError::validation("rule is missing a condition type"));
                    }
                    if !rule.weight.is_finite() {
                        return Err(SigtraderError::validation(format!(
                            "rule {} has a non-finite weight",
                            rule.condition_type
                        )));
                    }
                    rule.parse_params()
                        .map_err(|e| SigtraderError::validation(e.to_string()))?;
                }
            }
        }

        self.risk.validate()
    }

    /// Entry signal for one day. Condition sets with no conditions never fire.
    pub fn entry_signal(
        &self,
        scorer: &Scorer,
        snapshot: &AnalyticsSnapshot,
    ) -> Result<bool, EvaluationError> {
        match &self.signals {
            Signals::Conditions { buy, .. } => Ok(evaluate(snapshot, buy, EmptyPolicy::MatchNone)),
            Signals::Scoring(rules) => {
                scorer.is_triggered(&rules.entry_rules, rules.entry_threshold, snapshot)
            }
        }
    }

    /// Stop-loss and take-profit fractions in force for this strategy.
    ///
    /// Scoring strategies always run with hard stops, falling back to the
    /// defaults; condition strategies only use the configured ones.
    pub fn hard_stops(&self) -> (Option<f64>, Option<f64>) {
        match self.signals {
            Signals::Conditions { .. } => (self.risk.stop_loss_pct, self.risk.take_profit_pct),
            Signals::Scoring(_) => (
                Some(self.risk.stop_loss_pct.unwrap_or(DEFAULT_STOP_LOSS_PCT)),
                Some(self.risk.take_profit_pct.unwrap_or(DEFAULT_TAKE_PROFIT_PCT)),
            ),
        }
    }
}

fn prefix(context: &str, err: SigtraderError) -> SigtraderError {
    match err {
        SigtraderError::Validation { reason } => {
            SigtraderError::validation(format!("{}: {}", context, reason))
        }
        other => other,
    }
}
