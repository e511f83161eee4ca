//! Stochastic oscillator.
//!
//! %K[i] = 100 * (C[i] - LL) / (HH - LL) over the last k bars,
//! 50 when the range is flat.
//! %D = SMA(d) of %K.
//! Warmup: k - 1 + d - 1 bars.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::sma_over;
use crate::domain::ohlcv::Bar;

pub fn calculate_stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let k_values: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            if i + 1 < k_period {
                return None;
            }
            let window = &bars[i + 1 - k_period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let range = hh - ll;
            Some(if range == 0.0 {
                50.0
            } else {
                100.0 * (bars[i].close - ll) / range
            })
        })
        .collect();
    let d_values = sma_over(&k_values, d_period);

    let values = k_values
        .iter()
        .zip(&d_values)
        .map(|(k, d)| Some(IndicatorValue::Stochastic { k: (*k)?, d: (*d)? }))
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::{make_bars, make_hlc_bars};

    fn kd(series: &IndicatorSeries, i: usize) -> (f64, f64) {
        match series.get(i) {
            Some(IndicatorValue::Stochastic { k, d }) => (*k, *d),
            other => panic!("expected stochastic value, got {other:?}"),
        }
    }

    #[test]
    fn stochastic_warmup() {
        let prices: Vec<f64> = (0..10).map(|i| 1.0 + i as f64).collect();
        let series = calculate_stochastic(&make_bars(&prices), 4, 3);
        assert_eq!(series.leading_undefined(), 5);
    }

    #[test]
    fn stochastic_close_at_high_is_100() {
        let bars = make_hlc_bars(&[(11.0, 9.0, 10.0), (12.0, 10.0, 12.0), (13.0, 11.0, 13.0)]);
        let series = calculate_stochastic(&bars, 2, 1);
        let (k, d) = kd(&series, 2);
        assert!((k - 100.0).abs() < 1e-12);
        assert!((d - 100.0).abs() < 1e-12);
    }

    #[test]
    fn stochastic_d_is_mean_of_k() {
        let bars = make_hlc_bars(&[(10.0, 0.0, 5.0), (10.0, 0.0, 2.0), (10.0, 0.0, 8.0)]);
        let series = calculate_stochastic(&bars, 1, 2);
        // %K = 20, 80 at bars 1, 2
        let (k, d) = kd(&series, 2);
        assert!((k - 80.0).abs() < 1e-12);
        assert!((d - 50.0).abs() < 1e-12);
    }

    #[test]
    fn stochastic_flat_range_is_midpoint() {
        let series = calculate_stochastic(&make_bars(&[1.0; 4]), 2, 2);
        assert_eq!(kd(&series, 3), (50.0, 50.0));
    }
}
