//! Timeseries store port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::FxtraderError;
use crate::domain::timeseries::Timeseries;

pub trait DataPort {
    fn load_series(&self, instrument: &str) -> Result<Timeseries, FxtraderError>;

    fn list_instruments(&self) -> Result<Vec<String>, FxtraderError>;

    /// First timestamp, last timestamp and bar count; `None` when the
    /// instrument has no bars.
    fn get_data_range(
        &self,
        instrument: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, FxtraderError> {
        let series = self.load_series(instrument)?;
        Ok(series
            .first_timestamp()
            .zip(series.last_timestamp())
            .map(|(first, last)| (first, last, series.len())))
    }

    /// Bars with `start <= timestamp <= end`; either bound may be open.
    fn load_between(
        &self,
        instrument: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Timeseries, FxtraderError> {
        let series = self.load_series(instrument)?;
        let bars = series
            .iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .cloned()
            .collect();
        Timeseries::new(series.instrument(), bars)
    }
}
