//! CSV file data adapter.
//!
//! One file per instrument, `<base>/<INSTRUMENT>.csv`, with header
//! `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339, or
//! `%Y-%m-%d %H:%M:%S` / `%Y-%m-%d` read as UTC.

use crate::domain::error::FxtraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::timeseries::Timeseries;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", instrument))
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<&'r str, FxtraderError> {
    record.get(idx).ok_or_else(|| FxtraderError::DataSource {
        reason: format!("line {}: missing {} column", line, name),
    })
}

fn price(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<f64, FxtraderError> {
    let raw = field(record, idx, name, line)?;
    raw.trim().parse().map_err(|e| FxtraderError::DataSource {
        reason: format!("line {}: invalid {} value '{}': {}", line, name, raw, e),
    })
}

impl DataPort for CsvAdapter {
    fn load_series(&self, instrument: &str) -> Result<Timeseries, FxtraderError> {
        let path = self.csv_path(instrument);
        let content = fs::read_to_string(&path).map_err(|e| FxtraderError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| FxtraderError::DataSource {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let raw_ts = field(&record, 0, "timestamp", line)?;
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| FxtraderError::DataSource {
                reason: format!("line {}: invalid timestamp '{}'", line, raw_ts),
            })?;

            let volume = match record.get(5).map(str::trim) {
                None | Some("") => 0.0,
                Some(_) => price(&record, 5, "volume", line)?,
            };

            bars.push(Bar {
                timestamp,
                open: price(&record, 1, "open", line)?,
                high: price(&record, 2, "high", line)?,
                low: price(&record, 3, "low", line)?,
                close: price(&record, 4, "close", line)?,
                volume,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Timeseries::new(instrument, bars)
    }

    fn list_instruments(&self) -> Result<Vec<String>, FxtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| FxtraderError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut instruments = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| FxtraderError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(instrument) = name_str.strip_suffix(".csv") {
                instruments.push(instrument.to_string());
            }
        }

        instruments.sort();
        Ok(instruments)
    }
}
