//! Technical indicator toolbox.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorType`: indicator identity + validated parameters (serves as HashMap key)
//! - `IndicatorSpec`: declarative name + parameter map, converted into an `IndicatorType`
//! - `IndicatorValue`: enum for different indicator output shapes
//! - `IndicatorSeries`: output aligned index-for-index with the input bars
//! - `IndicatorSet`: every indicator a strategy needs, computed once per run
//!
//! Every indicator is causal: the value at index `i` depends on bars `0..=i`
//! only. Leading bars without enough look-back are `None`, never zero.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod ichimoku;
pub mod macd;
pub mod momentum;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;
pub mod wma;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::FxtraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::parameter::ParameterValue;
use crate::domain::timeseries::Timeseries;

/// Which bar field a price-based indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    Typical,
}

impl PriceSource {
    pub fn extract(&self, bar: &Bar) -> f64 {
        match self {
            PriceSource::Open => bar.open,
            PriceSource::High => bar.high,
            PriceSource::Low => bar.low,
            PriceSource::Close => bar.close,
            PriceSource::Typical => bar.typical_price(),
        }
    }
}

impl FromStr for PriceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PriceSource::Open),
            "high" => Ok(PriceSource::High),
            "low" => Ok(PriceSource::Low),
            "close" => Ok(PriceSource::Close),
            "typical" => Ok(PriceSource::Typical),
            other => Err(format!(
                "unknown price source '{}' (expected open, high, low, close, typical)",
                other
            )),
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriceSource::Open => "open",
            PriceSource::High => "high",
            PriceSource::Low => "low",
            PriceSource::Close => "close",
            PriceSource::Typical => "typical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Ichimoku {
        tenkan: f64,
        kijun: f64,
        senkou_a: f64,
        senkou_b: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum IndicatorType {
    Sma { period: usize, source: PriceSource },
    Ema { period: usize, source: PriceSource },
    Wma { period: usize, source: PriceSource },
    Rsi(usize),
    Roc(usize),
    Momentum(usize),
    Atr(usize),
    Adx(usize),
    Stddev(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Ichimoku {
        tenkan: usize,
        kijun: usize,
        senkou_b: usize,
    },
}

impl IndicatorType {
    /// Number of leading bars for which the indicator is undefined.
    pub fn warmup(&self) -> usize {
        match self {
            IndicatorType::Sma { period, .. }
            | IndicatorType::Ema { period, .. }
            | IndicatorType::Wma { period, .. }
            | IndicatorType::Atr(period)
            | IndicatorType::Stddev(period)
            | IndicatorType::Bollinger { period, .. } => period.saturating_sub(1),
            IndicatorType::Rsi(period)
            | IndicatorType::Roc(period)
            | IndicatorType::Momentum(period) => *period,
            IndicatorType::Adx(period) => (2 * period).saturating_sub(1),
            IndicatorType::Macd { slow, signal, .. } => (slow + signal).saturating_sub(2),
            IndicatorType::Stochastic { k_period, d_period } => {
                (k_period + d_period).saturating_sub(2)
            }
            IndicatorType::Ichimoku {
                tenkan,
                kijun,
                senkou_b,
            } => (kijun + (*tenkan).max(*kijun).max(*senkou_b)).saturating_sub(1),
        }
    }

    /// Reject parameter values outside the indicator's domain.
    pub fn validate(&self) -> Result<(), FxtraderError> {
        let name = self.name();
        let positive = |param: &str, value: usize| {
            if value == 0 {
                Err(FxtraderError::invalid_parameter(
                    format!("{name}.{param}"),
                    "must be at least 1",
                ))
            } else {
                Ok(())
            }
        };

        match self {
            IndicatorType::Sma { period, .. }
            | IndicatorType::Ema { period, .. }
            | IndicatorType::Wma { period, .. }
            | IndicatorType::Rsi(period)
            | IndicatorType::Roc(period)
            | IndicatorType::Momentum(period)
            | IndicatorType::Atr(period)
            | IndicatorType::Adx(period)
            | IndicatorType::Stddev(period) => positive("period", *period),
            IndicatorType::Macd { fast, slow, signal } => {
                positive("fast", *fast)?;
                positive("slow", *slow)?;
                positive("signal", *signal)?;
                if fast >= slow {
                    return Err(FxtraderError::invalid_parameter(
                        format!("{name}.fast"),
                        format!("fast period ({fast}) must be less than slow period ({slow})"),
                    ));
                }
                Ok(())
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                positive("k_period", *k_period)?;
                positive("d_period", *d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                positive("period", *period)?;
                if *stddev_mult_x100 == 0 {
                    return Err(FxtraderError::invalid_parameter(
                        format!("{name}.multiplier"),
                        "must be greater than 0",
                    ));
                }
                Ok(())
            }
            IndicatorType::Ichimoku {
                tenkan,
                kijun,
                senkou_b,
            } => {
                positive("tenkan", *tenkan)?;
                positive("kijun", *kijun)?;
                positive("senkou_b", *senkou_b)?;
                if tenkan >= kijun || kijun >= senkou_b {
                    return Err(FxtraderError::invalid_parameter(
                        format!("{name}.kijun"),
                        format!(
                            "periods must increase, got tenkan {tenkan}, kijun {kijun}, \
                             senkou_b {senkou_b}"
                        ),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndicatorType::Sma { .. } => "SMA",
            IndicatorType::Ema { .. } => "EMA",
            IndicatorType::Wma { .. } => "WMA",
            IndicatorType::Rsi(_) => "RSI",
            IndicatorType::Roc(_) => "ROC",
            IndicatorType::Momentum(_) => "MOMENTUM",
            IndicatorType::Atr(_) => "ATR",
            IndicatorType::Adx(_) => "ADX",
            IndicatorType::Stddev(_) => "STDDEV",
            IndicatorType::Macd { .. } => "MACD",
            IndicatorType::Stochastic { .. } => "STOCHASTIC",
            IndicatorType::Bollinger { .. } => "BOLLINGER",
            IndicatorType::Ichimoku { .. } => "ICHIMOKU",
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma { period, source }
            | IndicatorType::Ema { period, source }
            | IndicatorType::Wma { period, source } => {
                if *source == PriceSource::Close {
                    write!(f, "{}({})", self.name(), period)
                } else {
                    write!(f, "{}({},{})", self.name(), period, source)
                }
            }
            IndicatorType::Rsi(period)
            | IndicatorType::Roc(period)
            | IndicatorType::Momentum(period)
            | IndicatorType::Atr(period)
            | IndicatorType::Adx(period)
            | IndicatorType::Stddev(period) => write!(f, "{}({})", self.name(), period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Ichimoku {
                tenkan,
                kijun,
                senkou_b,
            } => write!(f, "ICHIMOKU({},{},{})", tenkan, kijun, senkou_b),
        }
    }
}

/// Declarative indicator description: a name plus named parameters.
///
/// `build` is the construction-time gate: unknown names, unknown or missing
/// parameters, wrong value kinds and out-of-domain values all fail here, before
/// any bar is touched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorSpec {
    pub name: String,
    pub params: BTreeMap<String, ParameterValue>,
}

impl IndicatorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        IndicatorSpec {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Build a spec from positional arguments in the indicator's declared
    /// parameter order, e.g. `MACD(12, 26, 9)`.
    pub fn from_positional(name: &str, args: Vec<ParameterValue>) -> Result<Self, FxtraderError> {
        let upper = name.to_ascii_uppercase();
        let names = parameter_names(&upper)
            .ok_or_else(|| FxtraderError::invalid_parameter(name, "unknown indicator"))?;
        if args.len() > names.len() {
            return Err(FxtraderError::invalid_parameter(
                name,
                format!("takes at most {} arguments, got {}", names.len(), args.len()),
            ));
        }
        let params = names
            .iter()
            .zip(args)
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Ok(IndicatorSpec {
            name: upper,
            params,
        })
    }

    /// Convert and validate.
    pub fn build(&self) -> Result<IndicatorType, FxtraderError> {
        let indicator = self.shape()?;
        indicator.validate()?;
        Ok(indicator)
    }

    /// Convert without domain validation; only the shape of the parameters
    /// (names, presence, value kinds) is checked.
    pub(crate) fn shape(&self) -> Result<IndicatorType, FxtraderError> {
        let name = self.name.to_ascii_uppercase();
        let allowed = parameter_names(&name)
            .ok_or_else(|| FxtraderError::invalid_parameter(&self.name, "unknown indicator"))?;
        if let Some(unknown) = self.params.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(FxtraderError::invalid_parameter(
                format!("{name}.{unknown}"),
                "unknown parameter",
            ));
        }

        let indicator = match name.as_str() {
            "SMA" => IndicatorType::Sma {
                period: self.period("period")?,
                source: self.source()?,
            },
            "EMA" => IndicatorType::Ema {
                period: self.period("period")?,
                source: self.source()?,
            },
            "WMA" => IndicatorType::Wma {
                period: self.period("period")?,
                source: self.source()?,
            },
            "RSI" => IndicatorType::Rsi(self.period("period")?),
            "ROC" => IndicatorType::Roc(self.period("period")?),
            "MOMENTUM" => IndicatorType::Momentum(self.period("period")?),
            "ATR" => IndicatorType::Atr(self.period("period")?),
            "ADX" => IndicatorType::Adx(self.period("period")?),
            "STDDEV" => IndicatorType::Stddev(self.period("period")?),
            "MACD" => IndicatorType::Macd {
                fast: self.period("fast")?,
                slow: self.period("slow")?,
                signal: self.period("signal")?,
            },
            "STOCHASTIC" => IndicatorType::Stochastic {
                k_period: self.period("k_period")?,
                d_period: self.period("d_period")?,
            },
            "BOLLINGER" => {
                let period = self.period("period")?;
                let mult = self.number("multiplier")?;
                if !mult.is_finite() || mult <= 0.0 {
                    return Err(FxtraderError::invalid_parameter(
                        "BOLLINGER.multiplier",
                        format!("must be a positive number, got {mult}"),
                    ));
                }
                IndicatorType::Bollinger {
                    period,
                    stddev_mult_x100: (mult * 100.0).round() as u32,
                }
            }
            "ICHIMOKU" => IndicatorType::Ichimoku {
                tenkan: self.period("tenkan")?,
                kijun: self.period("kijun")?,
                senkou_b: self.period("senkou_b")?,
            },
            _ => unreachable!("parameter_names covers every indicator name"),
        };
        Ok(indicator)
    }

    fn required(&self, key: &str) -> Result<&ParameterValue, FxtraderError> {
        self.params.get(key).ok_or_else(|| {
            FxtraderError::invalid_parameter(format!("{}.{}", self.name, key), "required")
        })
    }

    fn period(&self, key: &str) -> Result<usize, FxtraderError> {
        let value = self.required(key)?;
        value.as_usize().ok_or_else(|| {
            FxtraderError::invalid_parameter(
                format!("{}.{}", self.name, key),
                format!("expected a non-negative integer, got '{}'", value),
            )
        })
    }

    fn number(&self, key: &str) -> Result<f64, FxtraderError> {
        let value = self.required(key)?;
        value.as_f64().ok_or_else(|| {
            FxtraderError::invalid_parameter(
                format!("{}.{}", self.name, key),
                format!("expected a number, got '{}'", value),
            )
        })
    }

    fn source(&self) -> Result<PriceSource, FxtraderError> {
        match self.params.get("source") {
            None => Ok(PriceSource::Close),
            Some(ParameterValue::Choice(s)) => s.parse().map_err(|reason: String| {
                FxtraderError::invalid_parameter(format!("{}.source", self.name), reason)
            }),
            Some(other) => Err(FxtraderError::invalid_parameter(
                format!("{}.source", self.name),
                format!("expected a price field, got '{}'", other),
            )),
        }
    }
}

/// Declared parameter order for each indicator name.
pub fn parameter_names(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "SMA" | "EMA" | "WMA" => Some(&["period", "source"]),
        "RSI" | "ROC" | "MOMENTUM" | "ATR" | "ADX" | "STDDEV" => Some(&["period"]),
        "MACD" => Some(&["fast", "slow", "signal"]),
        "STOCHASTIC" => Some(&["k_period", "d_period"]),
        "BOLLINGER" => Some(&["period", "multiplier"]),
        "ICHIMOKU" => Some(&["tenkan", "kijun", "senkou_b"]),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<IndicatorValue>>,
}

impl IndicatorSeries {
    pub(crate) fn from_simple(indicator_type: IndicatorType, values: Vec<Option<f64>>) -> Self {
        IndicatorSeries {
            indicator_type,
            values: values
                .into_iter()
                .map(|v| v.map(IndicatorValue::Simple))
                .collect(),
        }
    }

    pub(crate) fn undefined(indicator_type: IndicatorType, len: usize) -> Self {
        IndicatorSeries {
            indicator_type,
            values: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&IndicatorValue> {
        self.values.get(index).and_then(|v| v.as_ref())
    }

    /// Count of leading undefined entries.
    pub fn leading_undefined(&self) -> usize {
        self.values.iter().take_while(|v| v.is_none()).count()
    }

    /// Simple values as plain floats, undefined entries as `None`.
    pub fn simple_values(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|v| match v {
                Some(IndicatorValue::Simple(x)) => Some(*x),
                _ => None,
            })
            .collect()
    }
}

/// Compute one indicator over the whole series.
pub fn compute(series: &Timeseries, indicator: &IndicatorType) -> IndicatorSeries {
    let bars = series.bars();
    match indicator {
        IndicatorType::Sma { period, source } => sma::calculate_sma(bars, *period, *source),
        IndicatorType::Ema { period, source } => ema::calculate_ema(bars, *period, *source),
        IndicatorType::Wma { period, source } => wma::calculate_wma(bars, *period, *source),
        IndicatorType::Rsi(period) => rsi::calculate_rsi(bars, *period),
        IndicatorType::Roc(period) => roc::calculate_roc(bars, *period),
        IndicatorType::Momentum(period) => momentum::calculate_momentum(bars, *period),
        IndicatorType::Atr(period) => atr::calculate_atr(bars, *period),
        IndicatorType::Adx(period) => adx::calculate_adx(bars, *period),
        IndicatorType::Stddev(period) => stddev::calculate_stddev(bars, *period),
        IndicatorType::Macd { fast, slow, signal } => {
            macd::calculate_macd(bars, *fast, *slow, *signal)
        }
        IndicatorType::Stochastic { k_period, d_period } => {
            stochastic::calculate_stochastic(bars, *k_period, *d_period)
        }
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => bollinger::calculate_bollinger(bars, *period, *stddev_mult_x100),
        IndicatorType::Ichimoku {
            tenkan,
            kijun,
            senkou_b,
        } => ichimoku::calculate_ichimoku(bars, *tenkan, *kijun, *senkou_b),
    }
}

/// All indicator series needed by one strategy run, keyed by type.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    series: HashMap<IndicatorType, IndicatorSeries>,
}

impl IndicatorSet {
    pub fn compute(series: &Timeseries, indicators: &[IndicatorType]) -> Self {
        let mut map = HashMap::with_capacity(indicators.len());
        for indicator in indicators {
            if !map.contains_key(indicator) {
                map.insert(indicator.clone(), compute(series, indicator));
            }
        }
        IndicatorSet { series: map }
    }

    pub fn get(&self, indicator: &IndicatorType) -> Option<&IndicatorSeries> {
        self.series.get(indicator)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_sma() {
        let sma = IndicatorType::Sma {
            period: 20,
            source: PriceSource::Close,
        };
        assert_eq!(sma.to_string(), "SMA(20)");
        let sma_high = IndicatorType::Sma {
            period: 20,
            source: PriceSource::High,
        };
        assert_eq!(sma_high.to_string(), "SMA(20,high)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn warmups() {
        assert_eq!(
            IndicatorType::Sma {
                period: 10,
                source: PriceSource::Close
            }
            .warmup(),
            9
        );
        assert_eq!(IndicatorType::Rsi(14).warmup(), 14);
        assert_eq!(
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
            .warmup(),
            33
        );
        assert_eq!(
            IndicatorType::Stochastic {
                k_period: 14,
                d_period: 3
            }
            .warmup(),
            15
        );
    }

    #[test]
    fn ichimoku_and_adx_warmups() {
        assert_eq!(IndicatorType::Adx(14).warmup(), 27);
        let cloud = IndicatorType::Ichimoku {
            tenkan: 9,
            kijun: 26,
            senkou_b: 52,
        };
        assert_eq!(cloud.warmup(), 77);
        assert_eq!(cloud.to_string(), "ICHIMOKU(9,26,52)");
    }

    #[test]
    fn spec_builds_ichimoku_and_rejects_unordered_periods() {
        let cloud = IndicatorSpec::new("ichimoku")
            .with("tenkan", 9)
            .with("kijun", 26)
            .with("senkou_b", 52)
            .build()
            .unwrap();
        assert_eq!(cloud.name(), "ICHIMOKU");
        let err = IndicatorSpec::new("ICHIMOKU")
            .with("tenkan", 26)
            .with("kijun", 9)
            .with("senkou_b", 52)
            .build()
            .unwrap_err();
        assert!(matches!(err, FxtraderError::InvalidParameter { .. }));
        assert!(IndicatorSpec::new("ICHIMOKU")
            .with("tenkan", 9)
            .with("kijun", 26)
            .build()
            .is_err());
        assert!(IndicatorSpec::new("ADX").with("period", 0).build().is_err());
        assert_eq!(
            IndicatorSpec::new("ADX").with("period", 14).build().unwrap(),
            IndicatorType::Adx(14)
        );
    }

    #[test]
    fn spec_builds_moving_average_with_source() {
        let spec = IndicatorSpec::new("ema").with("period", 10).with("source", "typical");
        assert_eq!(
            spec.build().unwrap(),
            IndicatorType::Ema {
                period: 10,
                source: PriceSource::Typical
            }
        );
    }

    #[test]
    fn spec_rejects_zero_period() {
        let err = IndicatorSpec::new("SMA").with("period", 0).build().unwrap_err();
        assert!(matches!(err, FxtraderError::InvalidParameter { .. }));
    }

    #[test]
    fn spec_rejects_negative_period() {
        let err = IndicatorSpec::new("RSI").with("period", -3).build().unwrap_err();
        assert!(matches!(err, FxtraderError::InvalidParameter { .. }));
    }

    #[test]
    fn spec_rejects_macd_fast_not_below_slow() {
        let err = IndicatorSpec::new("MACD")
            .with("fast", 26)
            .with("slow", 12)
            .with("signal", 9)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("less than slow"));
    }

    #[test]
    fn spec_rejects_unknown_name_and_parameter() {
        assert!(IndicatorSpec::new("KAMA").with("period", 3).build().is_err());
        assert!(IndicatorSpec::new("SMA")
            .with("period", 3)
            .with("length", 3)
            .build()
            .is_err());
    }

    #[test]
    fn spec_rejects_bad_source() {
        let err = IndicatorSpec::new("SMA")
            .with("period", 3)
            .with("source", "median")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown price source"));
    }

    #[test]
    fn spec_bollinger_multiplier() {
        let ind = IndicatorSpec::new("BOLLINGER")
            .with("period", 20)
            .with("multiplier", 2.5)
            .build()
            .unwrap();
        assert_eq!(
            ind,
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 250
            }
        );
        assert!(IndicatorSpec::new("BOLLINGER")
            .with("period", 20)
            .with("multiplier", -1.0)
            .build()
            .is_err());
    }

    #[test]
    fn from_positional_maps_declared_order() {
        let spec = IndicatorSpec::from_positional(
            "macd",
            vec![12.into(), 26.into(), 9.into()],
        )
        .unwrap();
        assert_eq!(spec.params.get("slow"), Some(&ParameterValue::Int(26)));
        assert!(IndicatorSpec::from_positional("RSI", vec![14.into(), 2.into()]).is_err());
    }

    #[test]
    fn compute_output_aligned_with_input() {
        let bars = test_support::make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let ts = Timeseries::new("T", bars).unwrap();
        let all = [
            IndicatorType::Sma {
                period: 3,
                source: PriceSource::Close,
            },
            IndicatorType::Ema {
                period: 3,
                source: PriceSource::Close,
            },
            IndicatorType::Wma {
                period: 3,
                source: PriceSource::Close,
            },
            IndicatorType::Rsi(3),
            IndicatorType::Roc(2),
            IndicatorType::Momentum(2),
            IndicatorType::Atr(3),
            IndicatorType::Stddev(3),
            IndicatorType::Macd {
                fast: 2,
                slow: 3,
                signal: 2,
            },
            IndicatorType::Stochastic {
                k_period: 3,
                d_period: 2,
            },
            IndicatorType::Bollinger {
                period: 3,
                stddev_mult_x100: 200,
            },
            IndicatorType::Adx(2),
            IndicatorType::Ichimoku {
                tenkan: 1,
                kijun: 2,
                senkou_b: 3,
            },
        ];
        for ind in &all {
            let out = compute(&ts, ind);
            assert_eq!(out.len(), ts.len(), "{ind}");
            assert_eq!(out.leading_undefined(), ind.warmup(), "{ind}");
        }
    }

    #[test]
    fn indicator_set_deduplicates() {
        let ts = Timeseries::new("T", test_support::make_bars(&[1.0, 2.0, 3.0])).unwrap();
        let sma = IndicatorType::Sma {
            period: 2,
            source: PriceSource::Close,
        };
        let set = IndicatorSet::compute(&ts, &[sma.clone(), sma.clone(), IndicatorType::Rsi(2)]);
        assert_eq!(set.len(), 2);
        assert!(set.get(&sma).is_some());
    }
}
