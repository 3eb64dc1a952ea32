//! Daily price access port.

use crate::domain::error::SigtraderError;
use crate::domain::price::PriceBar;
use chrono::NaiveDate;

pub trait PricePort {
    fn prices(&self, symbol: &str) -> Result<Vec<PriceBar>, SigtraderError>;

    fn price_on(&self, symbol: &str, date: NaiveDate) -> Result<Option<PriceBar>, SigtraderError> {
        Ok(self.prices(symbol)?.into_iter().find(|bar| bar.date == date))
    }
}
