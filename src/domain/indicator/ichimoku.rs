//! Ichimoku Kinko Hyo.
//!
//! mid(n)[i] = (highest high + lowest low) / 2 over the last n bars.
//! Tenkan = mid(tenkan), Kijun = mid(kijun).
//! The cloud is projected forward by `kijun` bars, so at bar i:
//! Senkou A = (Tenkan + Kijun) / 2 as of bar i - kijun,
//! Senkou B = mid(senkou_b) as of bar i - kijun.
//! The lagging (chikou) span reads future closes and is not computed.
//! Warmup: kijun + max(tenkan, kijun, senkou_b) - 1 bars.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

fn midpoints(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    (0..bars.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &bars[i + 1 - period..=i];
            let hh = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let ll = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            Some((hh + ll) / 2.0)
        })
        .collect()
}

pub fn calculate_ichimoku(
    bars: &[Bar],
    tenkan: usize,
    kijun: usize,
    senkou_b: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ichimoku {
        tenkan,
        kijun,
        senkou_b,
    };
    if tenkan == 0 || kijun == 0 || senkou_b == 0 {
        return IndicatorSeries::undefined(indicator_type, bars.len());
    }

    let tenkan_line = midpoints(bars, tenkan);
    let kijun_line = midpoints(bars, kijun);
    let span_b = midpoints(bars, senkou_b);

    let values = (0..bars.len())
        .map(|i| {
            let lagged = i.checked_sub(kijun)?;
            let t = tenkan_line[i]?;
            let k = kijun_line[i]?;
            let senkou_a = (tenkan_line[lagged]? + kijun_line[lagged]?) / 2.0;
            Some(IndicatorValue::Ichimoku {
                tenkan: t,
                kijun: k,
                senkou_a,
                senkou_b: span_b[lagged]?,
            })
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
