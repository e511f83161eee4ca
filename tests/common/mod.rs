#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use fxtrader::domain::backtest::Ledger;
use fxtrader::domain::error::FxtraderError;
pub use fxtrader::domain::ohlcv::Bar;
use fxtrader::domain::rule::{CustomRule, Rule};
use fxtrader::domain::strategy::Strategy;
use fxtrader::domain::template::RuleTemplate;
use fxtrader::domain::timeseries::Timeseries;
use fxtrader::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(instrument.to_string(), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors.insert(instrument.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_series(&self, instrument: &str) -> Result<Timeseries, FxtraderError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(FxtraderError::DataSource {
                reason: reason.clone(),
            });
        }
        Timeseries::new(
            instrument,
            self.data.get(instrument).cloned().unwrap_or_default(),
        )
    }

    fn list_instruments(&self) -> Result<Vec<String>, FxtraderError> {
        let mut names: Vec<String> = self.data.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Hourly bars. Open sits 0.5 below the close so next-open fills are
/// distinguishable from close fills.
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: start_time() + Duration::hours(i as i64),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        })
        .collect()
}

pub fn make_series(instrument: &str, closes: &[f64]) -> Timeseries {
    Timeseries::new(instrument, make_bars(closes)).unwrap()
}

/// Closes rising from `start` by `step` per bar.
pub fn trending(count: usize, start: f64, step: f64) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Smooth oscillation around `mid`; gives moving-average crosses both ways.
pub fn oscillating(count: usize, mid: f64, amplitude: f64, period: f64) -> Vec<f64> {
    (0..count)
        .map(|i| mid + amplitude * (i as f64 * std::f64::consts::TAU / period).sin())
        .collect()
}

/// Long on bar `entry`, exit signal on bar `exit`.
pub fn scripted_long(entry: usize, exit: usize) -> Strategy {
    Strategy::builder("Scripted")
        .long(
            Rule::Custom(CustomRule::new("entry", move |w| w.index() == entry)),
            Rule::Custom(CustomRule::new("exit", move |w| w.index() == exit)),
        )
        .build()
        .unwrap()
}

pub fn sma_cross_template() -> RuleTemplate {
    RuleTemplate::builder("SMA Cross")
        .long(
            "CROSS_ABOVE(SMA($fast), SMA($slow))",
            "CROSS_BELOW(SMA($fast), SMA($slow))",
        )
        .short(
            "CROSS_BELOW(SMA($fast), SMA($slow))",
            "CROSS_ABOVE(SMA($fast), SMA($slow))",
        )
        .constraint("fast < slow")
        .build()
        .unwrap()
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_csv(dir: &Path, instrument: &str, bars: &[Bar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.to_rfc3339(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    std::fs::write(dir.join(format!("{instrument}.csv")), content).unwrap();
}

/// Equity at every bar rebuilt from the trade list: P&L of trades closed at or
/// before the bar plus the open trade marked at the bar's close.
pub fn equity_from_trades(series: &Timeseries, ledger: &Ledger) -> Vec<f64> {
    series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let realized: f64 = ledger
                .trades
                .iter()
                .filter(|t| t.exit_index <= i)
                .map(|t| t.pnl)
                .sum();
            let open: f64 = ledger
                .trades
                .iter()
                .filter(|t| t.entry_index <= i && i < t.exit_index)
                .map(|t| (bar.close - t.entry_price) * t.direction.sign() * t.size)
                .sum();
            realized + open
        })
        .collect()
}
