//! Weighted rule scoring.
//!
//! Each rule names a condition type, carries raw JSON params and a weight.
//! The scorer looks the type up in its evaluator registry, feeds it the
//! parsed params and the snapshot, and normalises the weighted sum to 0-100.
//!
//! Evaluators with a `min` param are thresholded (exactly 0 or 1). Without
//! `min` they fall back to the continuous formulas older strategies were
//! tuned against, which are not clamped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::error::EvaluationError;
use crate::domain::snapshot::AnalyticsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Entry,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub condition_type: String,
    /// Raw JSON object; empty means no params.
    pub params: String,
    pub weight: f64,
    pub kind: RuleKind,
}

impl ScoringRule {
    pub fn new(condition_type: &str, params: &str, weight: f64, kind: RuleKind) -> Self {
        Self {
            condition_type: condition_type.to_string(),
            params: params.to_string(),
            weight,
            kind,
        }
    }

    pub fn parse_params(&self) -> Result<RuleParams, EvaluationError> {
        RuleParams::parse(&self.params).map_err(|e| EvaluationError {
            condition_type: self.condition_type.clone(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for ScoringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.trim().is_empty() {
            write!(f, "{}({})", self.condition_type, self.weight)
        } else {
            write!(f, "{}({}, {})", self.condition_type, self.weight, self.params)
        }
    }
}

/// Parameters understood by the built-in evaluators. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleParams {
    pub days: Option<f64>,
    pub min: Option<f64>,
    pub ma: Option<f64>,
}

impl RuleParams {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }
}

pub type ConditionEvaluator = Box<dyn Fn(&RuleParams, &AnalyticsSnapshot) -> f64 + Send + Sync>;

/// Condition-type name to evaluator table, owned by each [`Scorer`].
pub struct EvaluatorRegistry {
    evaluators: HashMap<String, ConditionEvaluator>,
}

impl EvaluatorRegistry {
    /// A registry with no evaluators.
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    /// PRICE_RETURN, VOLUME_SURGE, MA_DEVIATION, RANGE_POS and BASE_SCORE.
    pub fn builtin() -> Self {
        Self::empty()
            .with("PRICE_RETURN", eval_price_return)
            .with("VOLUME_SURGE", eval_volume_surge)
            .with("MA_DEVIATION", eval_ma_deviation)
            .with("RANGE_POS", eval_range_pos)
            .with("BASE_SCORE", eval_base_score)
    }

    pub fn with<F>(mut self, condition_type: &str, evaluator: F) -> Self
    where
        F: Fn(&RuleParams, &AnalyticsSnapshot) -> f64 + Send + Sync + 'static,
    {
        self.evaluators
            .insert(condition_type.to_string(), Box::new(evaluator));
        self
    }

    pub fn get(&self, condition_type: &str) -> Option<&ConditionEvaluator> {
        self.evaluators.get(condition_type)
    }

    pub fn contains(&self, condition_type: &str) -> bool {
        self.evaluators.contains_key(condition_type)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn thresholded(value: Option<f64>, params: &RuleParams, legacy: impl Fn(f64) -> f64) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };
    match params.min {
        Some(min) if value >= min => 1.0,
        Some(_) => 0.0,
        None => legacy(value),
    }
}

fn eval_price_return(params: &RuleParams, snapshot: &AnalyticsSnapshot) -> f64 {
    let value = match params.days.map(|d| d as i64) {
        Some(5) => snapshot.return5,
        Some(20) => snapshot.return20,
        Some(60) => snapshot.return60,
        _ => Some(snapshot.change_rate),
    };
    thresholded(value, params, |v| v * 100.0)
}

fn eval_volume_surge(params: &RuleParams, snapshot: &AnalyticsSnapshot) -> f64 {
    thresholded(snapshot.volume_multiple, params, |v| (v - 1.0) * 10.0)
}

fn eval_ma_deviation(params: &RuleParams, snapshot: &AnalyticsSnapshot) -> f64 {
    thresholded(snapshot.deviation20, params, |v| v * 100.0)
}

fn eval_range_pos(params: &RuleParams, snapshot: &AnalyticsSnapshot) -> f64 {
    thresholded(snapshot.range_pos20, params, |v| (v - 0.5) * 10.0)
}

fn eval_base_score(_params: &RuleParams, snapshot: &AnalyticsSnapshot) -> f64 {
    snapshot.score / 100.0
}

/// One rule's share of a computed score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponent {
    pub condition_type: String,
    pub contribution: f64,
    pub weight: f64,
    /// `contribution * weight / total_weight * 100`
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub components: Vec<ScoreComponent>,
}

/// Evaluates weighted rule lists. Holds no mutable state.
#[derive(Default)]
pub struct Scorer {
    registry: EvaluatorRegistry,
}

impl Scorer {
    pub fn new(registry: EvaluatorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    /// Weighted score in 0-100 (legacy evaluators may exceed it).
    ///
    /// Unknown condition types and rules with weight <= 0 are skipped. A params
    /// payload that fails to parse aborts the computation.
    pub fn score(
        &self,
        rules: &[ScoringRule],
        snapshot: &AnalyticsSnapshot,
    ) -> Result<f64, EvaluationError> {
        Ok(self.breakdown(rules, snapshot)?.total)
    }

    pub fn breakdown(
        &self,
        rules: &[ScoringRule],
        snapshot: &AnalyticsSnapshot,
    ) -> Result<ScoreBreakdown, EvaluationError> {
        let mut weighted = Vec::with_capacity(rules.len());
        let mut total_weight = 0.0;

        for rule in rules {
            let Some(evaluator) = self.registry.get(&rule.condition_type) else {
                continue;
            };
            let params = rule.parse_params()?;
            if rule.weight <= 0.0 {
                continue;
            }
            let contribution = evaluator(&params, snapshot);
            total_weight += rule.weight;
            weighted.push((rule, contribution));
        }

        if total_weight <= 0.0 {
            return Ok(ScoreBreakdown {
                total: 0.0,
                components: Vec::new(),
            });
        }

        let components: Vec<ScoreComponent> = weighted
            .into_iter()
            .map(|(rule, contribution)| ScoreComponent {
                condition_type: rule.condition_type.clone(),
                contribution,
                weight: rule.weight,
                points: contribution * rule.weight / total_weight * 100.0,
            })
            .collect();
        let weighted_sum: f64 = components.iter().map(|c| c.contribution * c.weight).sum();

        Ok(ScoreBreakdown {
            total: weighted_sum / total_weight * 100.0,
            components,
        })
    }

    /// Entry gate: score at or above `threshold`.
    pub fn is_triggered(
        &self,
        entry_rules: &[ScoringRule],
        threshold: f64,
        snapshot: &AnalyticsSnapshot,
    ) -> Result<bool, EvaluationError> {
        Ok(self.score(entry_rules, snapshot)? >= threshold)
    }

    /// Exit gate: score strictly below `threshold`. Never fires without exit rules.
    pub fn is_exit_triggered(
        &self,
        exit_rules: &[ScoringRule],
        threshold: f64,
        snapshot: &AnalyticsSnapshot,
    ) -> Result<bool, EvaluationError> {
        if exit_rules.is_empty() {
            return Ok(false);
        }
        Ok(self.score(exit_rules, snapshot)? < threshold)
    }
}

/// A named boolean condition and its weight in a truth-table gate.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedCondition {
    pub key: String,
    pub weight: f64,
}

impl WeightedCondition {
    pub fn new(key: &str, weight: f64) -> Self {
        Self {
            key: key.to_string(),
            weight,
        }
    }
}

/// Sum of the weights whose key is true. Missing keys count as false.
pub fn weighted_truth_score(truth: &HashMap<String, bool>, weights: &[WeightedCondition]) -> f64 {
    weights
        .iter()
        .filter(|wc| wc.weight > 0.0)
        .filter(|wc| truth.get(&wc.key).copied().unwrap_or(false))
        .map(|wc| wc.weight)
        .sum()
}

pub fn reach_threshold(
    truth: &HashMap<String, bool>,
    weights: &[WeightedCondition],
    threshold: f64,
) -> (f64, bool) {
    let score = weighted_truth_score(truth, weights);
    (score, score >= threshold)
}
