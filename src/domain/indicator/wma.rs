//! Weighted Moving Average.
//!
//! WMA(n) = (1*P[i-n+1] + 2*P[i-n+2] + ... + n*P[i]) / (n*(n+1)/2)
//! Sliding update: weighted += n*P[i] - window_sum; window_sum += P[i] - P[i-n].
//! Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, PriceSource};
use crate::domain::ohlcv::Bar;

pub fn calculate_wma(bars: &[Bar], period: usize, source: PriceSource) -> IndicatorSeries {
    let indicator_type = IndicatorType::Wma { period, source };
    if period == 0 {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let prices: Vec<f64> = bars.iter().map(|b| source.extract(b)).collect();
    let divisor = (period * (period + 1)) as f64 / 2.0;
    let mut weighted_sum = 0.0;
    let mut window_sum = 0.0;
    let mut values = Vec::with_capacity(prices.len());

    for (i, &price) in prices.iter().enumerate() {
        if i < period {
            weighted_sum += (i + 1) as f64 * price;
            window_sum += price;
        } else {
            weighted_sum += period as f64 * price - window_sum;
            window_sum += price - prices[i - period];
        }

        if i + 1 >= period {
            values.push(Some(weighted_sum / divisor));
        } else {
            values.push(None);
        }
    }

    IndicatorSeries::from_simple(indicator_type, values)
}
