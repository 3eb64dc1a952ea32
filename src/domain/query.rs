//! Query shapes shared by the analytics port and the screener.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::condition::{CategoryField, Condition, ConditionSet, Logic};
use super::snapshot::{AnalyticsSnapshot, NumericField, Tag};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 1000;

/// One instrument's history over an optional date window.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub symbol: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub only_success: bool,
}

impl HistoryQuery {
    pub fn new(symbol: &str) -> Self {
        HistoryQuery {
            symbol: symbol.to_string(),
            start: None,
            end: None,
            limit: None,
            only_success: true,
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn includes(&self, snapshot: &AnalyticsSnapshot) -> bool {
        if snapshot.symbol != self.symbol {
            return false;
        }
        if self.only_success && !snapshot.success {
            return false;
        }
        if self.start.is_some_and(|start| snapshot.trade_date < start) {
            return false;
        }
        if self.end.is_some_and(|end| snapshot.trade_date > end) {
            return false;
        }
        true
    }
}

/// Inclusive bounds on one numeric field.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericRange {
    pub field: NumericField,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Coarse cross-section filter a data source may apply.
///
/// Every constraint is a superset of what the originating conditions accept,
/// so callers re-check results with the full evaluator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    pub markets: Vec<String>,
    pub industries: Vec<String>,
    pub symbols: Vec<String>,
    pub tags_any: Vec<Tag>,
    pub tags_all: Vec<Tag>,
    pub ranges: Vec<NumericRange>,
    pub only_success: bool,
}

impl QueryFilter {
    pub fn only_success() -> Self {
        QueryFilter {
            only_success: true,
            ..QueryFilter::default()
        }
    }

    /// Derive the pushdown filter for `set`.
    ///
    /// Only AND sets can be narrowed; any other logic yields an unconstrained
    /// filter.
    pub fn from_set(set: &ConditionSet) -> Self {
        let mut filter = QueryFilter::only_success();
        if set.logic != Logic::And {
            return filter;
        }
        for condition in &set.conditions {
            match condition {
                Condition::Numeric { field, cmp } => {
                    if matches!(field, NumericField::Other(_)) {
                        continue;
                    }
                    let (min, max) = cmp.bounds();
                    filter.ranges.push(NumericRange {
                        field: field.clone(),
                        min,
                        max,
                    });
                }
                Condition::Category { field, values } => match field {
                    CategoryField::Market => filter.markets.extend(values.iter().cloned()),
                    CategoryField::Industry => filter.industries.extend(values.iter().cloned()),
                    CategoryField::Other(_) => {}
                },
                Condition::Tags {
                    include_any,
                    include_all,
                    ..
                } => {
                    filter.tags_any.extend(include_any.iter().cloned());
                    filter.tags_all.extend(include_all.iter().cloned());
                }
                Condition::Symbols { include, .. } => {
                    filter.symbols.extend(include.iter().cloned());
                }
            }
        }
        filter
    }

    pub fn matches(&self, snapshot: &AnalyticsSnapshot) -> bool {
        if self.only_success && !snapshot.success {
            return false;
        }
        if !self.markets.is_empty() && !contains_ignore_case(&self.markets, &snapshot.market) {
            return false;
        }
        if !self.industries.is_empty() && !contains_ignore_case(&self.industries, &snapshot.industry)
        {
            return false;
        }
        if !self.symbols.is_empty() && !self.symbols.iter().any(|s| s == &snapshot.symbol) {
            return false;
        }
        if !self.tags_any.is_empty() && !self.tags_any.iter().any(|t| snapshot.has_tag(t)) {
            return false;
        }
        if !self.tags_all.iter().all(|t| snapshot.has_tag(t)) {
            return false;
        }
        for range in &self.ranges {
            let Some(value) = snapshot.value(&range.field) else {
                return false;
            };
            if range.min.is_some_and(|min| value < min) || range.max.is_some_and(|max| value > max) {
                return false;
            }
        }
        true
    }
}

fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    let needle = needle.trim();
    values.iter().any(|v| v.trim().eq_ignore_ascii_case(needle))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOption {
    pub field: NumericField,
    pub descending: bool,
}

impl SortOption {
    pub fn desc(field: NumericField) -> Self {
        SortOption {
            field,
            descending: true,
        }
    }

    pub fn asc(field: NumericField) -> Self {
        SortOption {
            field,
            descending: false,
        }
    }
}

impl Default for SortOption {
    fn default() -> Self {
        SortOption::desc(NumericField::Score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    /// Zero selects the default page size.
    pub limit: usize,
}

impl Pagination {
    pub fn new(offset: usize, limit: usize) -> Self {
        Pagination { offset, limit }
    }

    pub fn effective_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        }
    }
}
