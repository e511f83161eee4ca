//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n prices, then
//! EMA[i] = (P[i] - EMA[i-1]) * k + EMA[i-1].
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, PriceSource};
use crate::domain::indicator_helpers::ema_over;
use crate::domain::ohlcv::Bar;

pub fn calculate_ema(bars: &[Bar], period: usize, source: PriceSource) -> IndicatorSeries {
    let prices: Vec<Option<f64>> = bars.iter().map(|b| Some(source.extract(b))).collect();
    IndicatorSeries::from_simple(
        IndicatorType::Ema { period, source },
        ema_over(&prices, period),
    )
}
