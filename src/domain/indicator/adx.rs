//! Average Directional Index (Wilder).
//!
//! +DM[i] = H[i] - H[i-1] when it exceeds L[i-1] - L[i] and is positive, else 0.
//! -DM[i] = L[i-1] - L[i] when it exceeds H[i] - H[i-1] and is positive, else 0.
//! TR, +DM and -DM are Wilder-summed over n bars starting at bar 1:
//! S[n] = sum(x[1..=n]), S[i] = S[i-1] - S[i-1] / n + x[i].
//! DX = 100 * |+DI - -DI| / (+DI + -DI), 0 when both are 0.
//! ADX seeds with the mean of the first n DX values, then
//! ADX[i] = (ADX[i-1] * (n-1) + DX[i]) / n.
//! Warmup: 2n - 1 bars.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

fn directional_index(tr: f64, plus_dm: f64, minus_dm: f64) -> f64 {
    if tr == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * plus_dm / tr;
    let minus_di = 100.0 * minus_dm / tr;
    let sum = plus_di + minus_di;
    if sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / sum
    }
}

pub fn calculate_adx(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Adx(period);
    if period == 0 || bars.len() < 2 * period {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let mut tr = vec![0.0; bars.len()];
    let mut plus_dm = vec![0.0; bars.len()];
    let mut minus_dm = vec![0.0; bars.len()];
    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        tr[i] = bars[i].true_range(bars[i - 1].close);
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let n = period as f64;
    let mut s_tr: f64 = tr[1..=period].iter().sum();
    let mut s_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut s_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx = vec![0.0; bars.len()];
    dx[period] = directional_index(s_tr, s_plus, s_minus);
    for i in period + 1..bars.len() {
        s_tr = s_tr - s_tr / n + tr[i];
        s_plus = s_plus - s_plus / n + plus_dm[i];
        s_minus = s_minus - s_minus / n + minus_dm[i];
        dx[i] = directional_index(s_tr, s_plus, s_minus);
    }

    let first = 2 * period - 1;
    let mut values = vec![None; bars.len()];
    let mut adx = dx[period..=first].iter().sum::<f64>() / n;
    values[first] = Some(adx);
    for i in first + 1..bars.len() {
        adx = (adx * (n - 1.0) + dx[i]) / n;
        values[i] = Some(adx);
    }

    IndicatorSeries::from_simple(indicator_type, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::{make_bars, make_hlc_bars, simple};

    #[test]
    fn adx_warmup() {
        let prices: Vec<f64> = (0..20).map(|i| 1.0 + i as f64 * 0.01).collect();
        let series = calculate_adx(&make_bars(&prices), 4);
        assert_eq!(series.len(), 20);
        assert_eq!(series.leading_undefined(), 7);
    }

    #[test]
    fn adx_steady_uptrend_is_100() {
        // every bar makes a higher high and a higher low
        let hlc: Vec<(f64, f64, f64)> = (0..12)
            .map(|i| {
                let base = 10.0 + i as f64;
                (base + 1.0, base - 1.0, base)
            })
            .collect();
        let series = calculate_adx(&make_hlc_bars(&hlc), 3);
        for i in 5..12 {
            assert!((simple(&series, i) - 100.0).abs() < 1e-9, "bar {i}");
        }
    }

    #[test]
    fn adx_flat_market_is_zero() {
        let series = calculate_adx(&make_bars(&[1.5; 10]), 3);
        assert_eq!(series.leading_undefined(), 5);
        assert_eq!(simple(&series, 9), 0.0);
    }

    #[test]
    fn adx_choppy_market_is_weaker_than_trend() {
        let hlc: Vec<(f64, f64, f64)> = (0..30)
            .map(|i| {
                let base = if i % 2 == 0 { 10.0 } else { 10.5 };
                (base + 1.0, base - 1.0, base)
            })
            .collect();
        let series = calculate_adx(&make_hlc_bars(&hlc), 5);
        let last = simple(&series, 29);
        assert!((0.0..50.0).contains(&last), "adx {last}");
    }

    #[test]
    fn adx_insufficient_bars() {
        let series = calculate_adx(&make_bars(&[1.0, 2.0, 3.0]), 2);
        assert_eq!(series.leading_undefined(), 3);
    }
}
