//! Momentum.
//!
//! MOMENTUM(n)[i] = C[i] - C[i-n]
//! Warmup: first n bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_momentum(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Momentum(period);
    if period == 0 {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let values = (0..bars.len())
        .map(|i| (i >= period).then(|| bars[i].close - bars[i - period].close))
        .collect();

    IndicatorSeries::from_simple(indicator_type, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::{make_bars, simple};

    #[test]
    fn momentum_difference() {
        let series = calculate_momentum(&make_bars(&[1.10, 1.12, 1.09, 1.15]), 2);
        assert_eq!(series.leading_undefined(), 2);
        assert!((simple(&series, 2) - (1.09 - 1.10)).abs() < 1e-12);
        assert!((simple(&series, 3) - (1.15 - 1.12)).abs() < 1e-12);
    }

    #[test]
    fn momentum_empty() {
        assert!(calculate_momentum(&[], 3).is_empty());
    }
}
