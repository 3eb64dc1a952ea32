//! CSV file data adapter.
//!
//! Layout under the base directory:
//! - `analytics.csv`: one row per symbol per trading day
//! - `prices/<SYMBOL>.csv`: `date,open,high,low,close,volume`

use crate::domain::error::SigtraderError;
use crate::domain::portfolio::EquityPoint;
use crate::domain::position::Trade;
use crate::domain::price::PriceBar;
use crate::domain::query::{HistoryQuery, QueryFilter};
use crate::domain::snapshot::{AnalyticsSnapshot, Tag};
use crate::ports::analytics_port::AnalyticsPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ANALYTICS_FILE: &str = "analytics.csv";
pub const PRICES_DIR: &str = "prices";

pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct AnalyticsRow {
    symbol: String,
    #[serde(default)]
    market: String,
    #[serde(default)]
    industry: String,
    trade_date: NaiveDate,
    close: f64,
    #[serde(default)]
    change: f64,
    #[serde(default)]
    change_rate: f64,
    return5: Option<f64>,
    return20: Option<f64>,
    return60: Option<f64>,
    ma5: Option<f64>,
    ma10: Option<f64>,
    ma20: Option<f64>,
    ma60: Option<f64>,
    deviation20: Option<f64>,
    high20: Option<f64>,
    low20: Option<f64>,
    range_pos20: Option<f64>,
    volume_multiple: Option<f64>,
    amplitude: Option<f64>,
    avg_amplitude20: Option<f64>,
    #[serde(default)]
    score: f64,
    /// `|`-separated tag names.
    #[serde(default)]
    tags: String,
    success: bool,
    error_reason: Option<String>,
}

impl AnalyticsRow {
    fn into_snapshot(self) -> AnalyticsSnapshot {
        let mut tags = Vec::new();
        for name in self.tags.split('|').map(str::trim).filter(|t| !t.is_empty()) {
            let tag = Tag::from_name(name);
            if tag.is_known() {
                tags.push(tag);
            } else {
                debug!(symbol = %self.symbol, tag = name, "ignoring unknown tag");
            }
        }
        AnalyticsSnapshot {
            symbol: self.symbol,
            market: self.market,
            industry: self.industry,
            trade_date: self.trade_date,
            close: self.close,
            change: self.change,
            change_rate: self.change_rate,
            return5: self.return5,
            return20: self.return20,
            return60: self.return60,
            ma5: self.ma5,
            ma10: self.ma10,
            ma20: self.ma20,
            ma60: self.ma60,
            deviation20: self.deviation20,
            high20: self.high20,
            low20: self.low20,
            range_pos20: self.range_pos20,
            volume_multiple: self.volume_multiple,
            amplitude: self.amplitude,
            avg_amplitude20: self.avg_amplitude20,
            score: self.score,
            tags,
            success: self.success,
            error_reason: self.error_reason.filter(|r| !r.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn analytics_path(&self) -> PathBuf {
        self.base_path.join(ANALYTICS_FILE)
    }

    fn price_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(PRICES_DIR).join(format!("{}.csv", symbol))
    }

    /// Every row of `analytics.csv`, in file order.
    pub fn load_analytics(&self) -> Result<Vec<AnalyticsSnapshot>, SigtraderError> {
        let path = self.analytics_path();
        let mut rdr = open_reader(&path)?;
        let mut snapshots = Vec::new();
        for (line, result) in rdr.deserialize::<AnalyticsRow>().enumerate() {
            let row = result.map_err(|e| SigtraderError::Data {
                reason: format!("{} row {}: {}", path.display(), line + 1, e),
            })?;
            snapshots.push(row.into_snapshot());
        }
        debug!(path = %path.display(), rows = snapshots.len(), "analytics loaded");
        Ok(snapshots)
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, SigtraderError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| SigtraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })
}

impl AnalyticsPort for CsvAdapter {
    fn history(&self, query: &HistoryQuery) -> Result<Vec<AnalyticsSnapshot>, SigtraderError> {
        let mut rows: Vec<AnalyticsSnapshot> = self
            .load_analytics()?
            .into_iter()
            .filter(|s| query.includes(s))
            .collect();
        if let Some(limit) = query.limit {
            if rows.len() > limit {
                rows.sort_by(|a, b| b.trade_date.cmp(&a.trade_date));
                rows.truncate(limit);
            }
        }
        Ok(rows)
    }

    fn by_date(
        &self,
        date: NaiveDate,
        filter: &QueryFilter,
    ) -> Result<Vec<AnalyticsSnapshot>, SigtraderError> {
        Ok(self
            .load_analytics()?
            .into_iter()
            .filter(|s| s.trade_date == date && filter.matches(s))
            .collect())
    }
}

impl PricePort for CsvAdapter {
    fn prices(&self, symbol: &str) -> Result<Vec<PriceBar>, SigtraderError> {
        let path = self.price_path(symbol);
        if !path.exists() {
            warn!(symbol, path = %path.display(), "no price file");
            return Ok(Vec::new());
        }
        let mut rdr = open_reader(&path)?;
        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<PriceRow>().enumerate() {
            let row = result.map_err(|e| SigtraderError::Data {
                reason: format!("{} row {}: {}", path.display(), line + 1, e),
            })?;
            bars.push(PriceBar {
                symbol: symbol.to_string(),
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

/// Write one row per closed trade.
pub fn write_trades(path: &Path, trades: &[Trade]) -> Result<(), SigtraderError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_write_error(path, e))?;
    for trade in trades {
        wtr.serialize(trade).map_err(|e| csv_write_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_equity_curve(path: &Path, curve: &[EquityPoint]) -> Result<(), SigtraderError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_write_error(path, e))?;
    for point in curve {
        wtr.serialize(point).map_err(|e| csv_write_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

fn csv_write_error(path: &Path, e: csv::Error) -> SigtraderError {
    SigtraderError::Data {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}
