//! Bollinger Bands.
//!
//! - Middle: SMA over n closes
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation. The multiplier is carried
//! in hundredths so the indicator type stays hashable.
//! Warmup: first (period-1) bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::mean_and_stddev;
use crate::domain::ohlcv::Bar;

pub fn calculate_bollinger(bars: &[Bar], period: usize, stddev_mult_x100: u32) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    if period == 0 {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let mult = stddev_mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = (0..closes.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let (middle, sd) = mean_and_stddev(&closes[i + 1 - period..=i]);
            Some(IndicatorValue::Bollinger {
                upper: middle + mult * sd,
                middle,
                lower: middle - mult * sd,
            })
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn bands(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.get(i) {
            Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            }) => (*upper, *middle, *lower),
            other => panic!("expected bollinger value, got {other:?}"),
        }
    }

    #[test]
    fn bollinger_known_values() {
        let bars = make_bars(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let series = calculate_bollinger(&bars, 8, 200);
        assert_eq!(series.leading_undefined(), 7);
        let (upper, middle, lower) = bands(&series, 7);
        assert!((middle - 5.0).abs() < 1e-12);
        assert!((upper - 9.0).abs() < 1e-12);
        assert!((lower - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bollinger_constant_collapses() {
        let series = calculate_bollinger(&make_bars(&[3.0; 4]), 3, 250);
        let (upper, middle, lower) = bands(&series, 3);
        assert_eq!(upper, middle);
        assert_eq!(lower, middle);
    }

    #[test]
    fn bollinger_bands_ordered() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + ((i * 13) % 7) as f64).collect();
        let series = calculate_bollinger(&make_bars(&prices), 5, 150);
        for i in 4..30 {
            let (upper, middle, lower) = bands(&series, i);
            assert!(upper >= middle && middle >= lower);
        }
    }
}
