//! Analytics history access port.

use crate::domain::error::SigtraderError;
use crate::domain::query::{HistoryQuery, QueryFilter};
use crate::domain::snapshot::AnalyticsSnapshot;
use chrono::NaiveDate;

/// Read-only source of per-instrument, per-day analytics snapshots.
///
/// Neither method promises any ordering of the returned rows.
pub trait AnalyticsPort {
    fn history(&self, query: &HistoryQuery) -> Result<Vec<AnalyticsSnapshot>, SigtraderError>;

    /// Every snapshot dated `date` that passes `filter`. Implementations may
    /// apply the filter partially; callers re-check.
    fn by_date(
        &self,
        date: NaiveDate,
        filter: &QueryFilter,
    ) -> Result<Vec<AnalyticsSnapshot>, SigtraderError>;
}
