//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(P[i-n+1..=i]) over the chosen price source.
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, PriceSource};
use crate::domain::indicator_helpers::sma_over;
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize, source: PriceSource) -> IndicatorSeries {
    let prices: Vec<Option<f64>> = bars.iter().map(|b| Some(source.extract(b))).collect();
    IndicatorSeries::from_simple(
        IndicatorType::Sma { period, source },
        sma_over(&prices, period),
    )
}
