//! Standard Deviation indicator.
//!
//! Population standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::mean_and_stddev;
use crate::domain::ohlcv::Bar;

pub fn calculate_stddev(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stddev(period);
    if period == 0 {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = (0..closes.len())
        .map(|i| {
            (i + 1 >= period).then(|| mean_and_stddev(&closes[i + 1 - period..=i]).1)
        })
        .collect();

    IndicatorSeries::from_simple(indicator_type, values)
}
