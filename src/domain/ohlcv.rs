//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::FxtraderError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Build a bar, rejecting non-finite prices, `low <= {open, close} <= high`
    /// violations, and negative volume.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, FxtraderError> {
        let bar = Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.check().map_err(|reason| FxtraderError::InvalidBar { index: 0, reason })?;
        Ok(bar)
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err("prices must be finite".to_string());
        }
        if self.low > self.open.min(self.close) || self.high < self.open.max(self.close) {
            return Err(format!(
                "expected low <= open, close <= high, got o={} h={} l={} c={}",
                self.open, self.high, self.low, self.close
            ));
        }
        if !(self.volume >= 0.0) {
            return Err(format!("volume must be non-negative, got {}", self.volume));
        }
        Ok(())
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}
