//! In-memory analytics and price store.
//!
//! Backs both data ports from plain vectors. Useful for tests and for callers
//! that already hold their data in memory.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::error::SigtraderError;
use crate::domain::price::PriceBar;
use crate::domain::query::{HistoryQuery, QueryFilter};
use crate::domain::snapshot::AnalyticsSnapshot;
use crate::ports::analytics_port::AnalyticsPort;
use crate::ports::price_port::PricePort;

#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    snapshots: Vec<AnalyticsSnapshot>,
    prices: HashMap<String, Vec<PriceBar>>,
}

impl MemoryAdapter {
    pub fn new(snapshots: Vec<AnalyticsSnapshot>, bars: Vec<PriceBar>) -> Self {
        let mut prices: HashMap<String, Vec<PriceBar>> = HashMap::new();
        for bar in bars {
            prices.entry(bar.symbol.clone()).or_default().push(bar);
        }
        MemoryAdapter { snapshots, prices }
    }
}

impl AnalyticsPort for MemoryAdapter {
    /// Newest first; `limit` keeps the most recent rows.
    fn history(&self, query: &HistoryQuery) -> Result<Vec<AnalyticsSnapshot>, SigtraderError> {
        let mut rows: Vec<AnalyticsSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| query.includes(s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.trade_date.cmp(&a.trade_date));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn by_date(
        &self,
        date: NaiveDate,
        filter: &QueryFilter,
    ) -> Result<Vec<AnalyticsSnapshot>, SigtraderError> {
        Ok(self
            .snapshots
            .iter()
            .filter(|s| s.trade_date == date && filter.matches(s))
            .cloned()
            .collect())
    }
}

impl PricePort for MemoryAdapter {
    fn prices(&self, symbol: &str) -> Result<Vec<PriceBar>, SigtraderError> {
        let mut bars = self.prices.get(symbol).cloned().unwrap_or_default();
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
