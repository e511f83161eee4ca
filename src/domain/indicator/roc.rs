//! Rate of Change.
//!
//! ROC(n)[i] = (C[i] - C[i-n]) / C[i-n] * 100
//! Undefined when C[i-n] == 0.
//! Warmup: first n bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_roc(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Roc(period);
    if period == 0 {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let values = (0..bars.len())
        .map(|i| {
            if i < period {
                return None;
            }
            let base = bars[i - period].close;
            if base == 0.0 {
                None
            } else {
                Some((bars[i].close - base) / base * 100.0)
            }
        })
        .collect();

    IndicatorSeries::from_simple(indicator_type, values)
}
