//! Ordered, validated bar sequence.
//!
//! A `Timeseries` is built once by the data collaborator and then only read by
//! the engine. Timestamps are strictly increasing; the interval between bars
//! may be fixed or irregular.

use chrono::{DateTime, Utc};

use super::error::FxtraderError;
use super::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct Timeseries {
    instrument: String,
    bars: Vec<Bar>,
}

impl Timeseries {
    pub fn new(instrument: impl Into<String>, bars: Vec<Bar>) -> Result<Self, FxtraderError> {
        for (index, bar) in bars.iter().enumerate() {
            bar.check()
                .map_err(|reason| FxtraderError::InvalidBar { index, reason })?;
        }
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(FxtraderError::InvalidSeries {
                reason: format!(
                    "timestamps must be strictly increasing (bar {} at {} follows {})",
                    pos + 1,
                    bars[pos + 1].timestamp,
                    bars[pos].timestamp
                ),
            });
        }
        Ok(Timeseries {
            instrument: instrument.into(),
            bars,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// Copy of the first `len` bars (all of them if `len` exceeds the length).
    pub fn prefix(&self, len: usize) -> Timeseries {
        Timeseries {
            instrument: self.instrument.clone(),
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }

    /// Closing prices, index-aligned with the bars.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

impl<'a> IntoIterator for &'a Timeseries {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar(minutes: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn accepts_irregular_intervals() {
        let ts = Timeseries::new("EUR_USD", vec![bar(0, 1.0), bar(15, 1.1), bar(60, 1.2)]).unwrap();
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.instrument(), "EUR_USD");
        assert_eq!(ts.get(1).unwrap().close, 1.1);
        assert!(ts.get(3).is_none());
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let err = Timeseries::new("EUR_USD", vec![bar(0, 1.0), bar(0, 1.1)]).unwrap_err();
        assert!(matches!(err, FxtraderError::InvalidSeries { .. }));
    }

    #[test]
    fn rejects_decreasing_timestamps() {
        assert!(Timeseries::new("EUR_USD", vec![bar(15, 1.0), bar(0, 1.1)]).is_err());
    }

    #[test]
    fn reports_index_of_malformed_bar() {
        let mut bad = bar(15, 1.0);
        bad.high = 0.1;
        let err = Timeseries::new("EUR_USD", vec![bar(0, 1.0), bad]).unwrap_err();
        match err {
            FxtraderError::InvalidBar { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn prefix_truncates() {
        let ts = Timeseries::new("X", vec![bar(0, 1.0), bar(1, 2.0), bar(2, 3.0)]).unwrap();
        let head = ts.prefix(2);
        assert_eq!(head.len(), 2);
        assert_eq!(head.closes(), vec![1.0, 2.0]);
        assert_eq!(ts.prefix(10).len(), 3);
    }

    #[test]
    fn empty_series_is_valid() {
        let ts = Timeseries::new("X", vec![]).unwrap();
        assert!(ts.is_empty());
        assert!(ts.first_timestamp().is_none());
    }
}
