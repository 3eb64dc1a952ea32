//! Cross-section screener over one trading day.
//!
//! A coarse filter is pushed down to the analytics source, then every row is
//! re-checked with the full condition evaluator, so correctness never depends
//! on what the source actually filtered.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::condition::{Comparison, Condition, ConditionSet, EmptyPolicy};
use super::condition_eval::{evaluate, matches_consecutive};
use super::error::SigtraderError;
use super::query::{HistoryQuery, Pagination, QueryFilter, SortOption};
use super::snapshot::{AnalyticsSnapshot, NumericField, Tag};
use crate::ports::analytics_port::AnalyticsPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenerPage {
    pub results: Vec<AnalyticsSnapshot>,
    pub total: usize,
    pub has_more: bool,
}

pub struct Screener<'a> {
    analytics: &'a dyn AnalyticsPort,
}

impl<'a> Screener<'a> {
    pub fn new(analytics: &'a dyn AnalyticsPort) -> Self {
        Screener { analytics }
    }

    /// Screen every successful snapshot dated `date`.
    ///
    /// An empty `set` matches everything.
    pub fn run(
        &self,
        date: NaiveDate,
        set: &ConditionSet,
        sort: &SortOption,
        page: Pagination,
    ) -> Result<ScreenerPage, SigtraderError> {
        set.validate()?;

        let filter = QueryFilter::from_set(set);
        let candidates = self.analytics.by_date(date, &filter)?;
        let fetched = candidates.len();

        let mut filtered: Vec<AnalyticsSnapshot> = candidates
            .into_iter()
            .filter(|s| s.success && s.trade_date == date)
            .filter(|s| evaluate(s, set, EmptyPolicy::MatchAll))
            .collect();
        sort_snapshots(&mut filtered, sort);

        let total = filtered.len();
        let offset = page.offset.min(total);
        let end = offset.saturating_add(page.effective_limit()).min(total);
        let has_more = end < total;
        let results = filtered.drain(offset..end).collect();

        debug!(%date, fetched, total, offset, "screen complete");
        Ok(ScreenerPage {
            results,
            total,
            has_more,
        })
    }

    /// Keep only the rows whose symbol matched `set` on each of its last
    /// `days` successful trading days ending on `date`.
    ///
    /// A streak of one day or less adds nothing and returns `results` as-is.
    pub fn confirm_streak(
        &self,
        results: Vec<AnalyticsSnapshot>,
        date: NaiveDate,
        set: &ConditionSet,
        days: usize,
    ) -> Result<Vec<AnalyticsSnapshot>, SigtraderError> {
        if days <= 1 {
            return Ok(results);
        }
        let mut kept = Vec::with_capacity(results.len());
        for snapshot in results {
            let mut query = HistoryQuery::new(&snapshot.symbol);
            query.end = Some(date);
            let history = self.analytics.history(&query)?;
            if matches_consecutive(&history, date, set, days) {
                kept.push(snapshot);
            } else {
                debug!(symbol = %snapshot.symbol, %date, days, "streak not confirmed");
            }
        }
        Ok(kept)
    }
}

/// Order by the sort field, with absent values last in either direction and
/// symbol ascending as the tiebreak. NaN counts as absent.
pub fn sort_snapshots(snapshots: &mut [AnalyticsSnapshot], sort: &SortOption) {
    let key = |s: &AnalyticsSnapshot| s.value(&sort.field).filter(|v| !v.is_nan());
    snapshots.sort_by(|a, b| {
        let by_value = match (key(a), key(b)) {
            (Some(x), Some(y)) => {
                let ord = x.total_cmp(&y);
                if sort.descending { ord.reverse() } else { ord }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_value.then_with(|| a.symbol.cmp(&b.symbol))
    });
}

/// A named, ready-to-run screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub date: NaiveDate,
    pub conditions: ConditionSet,
    pub sort: SortOption,
}

fn gte(field: NumericField, value: f64) -> Condition {
    Condition::numeric(field, Comparison::Gte(value))
}

/// The built-in screens, all dated `date`.
pub fn presets(date: NaiveDate) -> Vec<Preset> {
    vec![
        Preset {
            id: "short_term_strong",
            name: "Short-term strong",
            description: "Strong 5-day return, expanding volume, upper half of the 20-day range",
            date,
            conditions: ConditionSet::all(vec![
                gte(NumericField::Return5, 0.05),
                gte(NumericField::RangePos20, 0.6),
                gte(NumericField::VolumeMultiple, 1.5),
                Condition::Tags {
                    include_any: vec![Tag::ShortTermStrong, Tag::VolumeSurge],
                    include_all: vec![],
                    exclude_any: vec![],
                },
            ]),
            sort: SortOption::desc(NumericField::Score),
        },
        Preset {
            id: "volume_surge",
            name: "Volume surge",
            description: "Volume well above average with a non-negative 5-day return",
            date,
            conditions: ConditionSet::all(vec![
                gte(NumericField::VolumeMultiple, 2.0),
                gte(NumericField::Return5, 0.0),
            ]),
            sort: SortOption::desc(NumericField::VolumeMultiple),
        },
        Preset {
            id: "bullish_breakout",
            name: "Bullish breakout",
            description: "Near the 20-day high, above the 20-day average, good score",
            date,
            conditions: ConditionSet::all(vec![
                gte(NumericField::RangePos20, 0.9),
                gte(NumericField::Score, 65.0),
                gte(NumericField::Deviation20, 0.0),
                gte(NumericField::Return20, 0.0),
            ]),
            sort: SortOption::desc(NumericField::Score),
        },
        Preset {
            id: "low_vol_base",
            name: "Low-volatility base",
            description: "Quiet 20-day range hugging the moving average",
            date,
            conditions: ConditionSet::all(vec![
                Condition::numeric(NumericField::AvgAmplitude20, Comparison::Lte(0.02)),
                Condition::numeric(
                    NumericField::Deviation20,
                    Comparison::Between {
                        min: -0.02,
                        max: 0.02,
                    },
                ),
                Condition::Tags {
                    include_any: vec![],
                    include_all: vec![],
                    exclude_any: vec![Tag::HighVolatility],
                },
            ]),
            sort: SortOption::desc(NumericField::Score),
        },
        Preset {
            id: "near_high",
            name: "Near high",
            description: "Close near the 20-day high with a good score",
            date,
            conditions: ConditionSet::all(vec![
                gte(NumericField::RangePos20, 0.8),
                gte(NumericField::Score, 60.0),
            ]),
            sort: SortOption::desc(NumericField::RangePos20),
        },
    ]
}

pub fn preset(id: &str, date: NaiveDate) -> Option<Preset> {
    presets(date).into_iter().find(|p| p.id == id)
}
