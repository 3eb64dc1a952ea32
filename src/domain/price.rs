//! Daily price bars and by-date lookup.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// One instrument's bars indexed by date.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl PriceSeries {
    /// Build a series; on duplicate dates the later bar wins.
    pub fn new(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self { bars, date_index }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// The bar dated exactly one calendar day after `date`, if any.
    pub fn next_day(&self, date: NaiveDate) -> Option<&PriceBar> {
        date.checked_add_days(Days::new(1))
            .and_then(|next| self.get(next))
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, open: f64, close: f64) -> PriceBar {
        PriceBar {
            symbol: "MSFT".into(),
            date,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1_000,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    #[test]
    fn lookup_by_date_after_unsorted_input() {
        let series = PriceSeries::new(vec![bar(d(3), 12.0, 13.0), bar(d(1), 10.0, 11.0)]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].date, d(1));
        assert_eq!(series.get(d(3)).map(|b| b.close), Some(13.0));
        assert!(series.get(d(2)).is_none());
    }

    #[test]
    fn next_day_is_calendar_adjacent() {
        let series = PriceSeries::new(vec![bar(d(1), 10.0, 11.0), bar(d(2), 11.5, 12.0)]);
        assert_eq!(series.next_day(d(1)).map(|b| b.open), Some(11.5));
        assert!(series.next_day(d(2)).is_none());
    }

    #[test]
    fn empty_series() {
        let series = PriceSeries::default();
        assert!(series.is_empty());
        assert!(series.next_day(d(1)).is_none());
    }
}
