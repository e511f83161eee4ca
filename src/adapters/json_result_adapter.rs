//! JSON file result sink.
//!
//! Writes one pretty-printed document per run into the output directory.
//! Undefined metrics (NaN) are written as `null`.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FxtraderError;
use crate::domain::optimizer::OptimizationResult;
use crate::ports::result_port::ResultPort;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct JsonResultAdapter {
    output_dir: PathBuf,
}

impl JsonResultAdapter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write<T: Serialize>(&self, file_name: String, value: &T) -> Result<PathBuf, FxtraderError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "result written");
        Ok(path)
    }
}

/// File-name-safe form of a strategy or template name.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

impl ResultPort for JsonResultAdapter {
    fn write_backtest(&self, result: &BacktestResult) -> Result<PathBuf, FxtraderError> {
        let name = format!("{}_{}_backtest.json", result.instrument, slug(&result.strategy));
        self.write(name, result)
    }

    fn write_optimization(&self, result: &OptimizationResult) -> Result<PathBuf, FxtraderError> {
        let name = format!("{}_{}_optimize.json", result.instrument, slug(&result.template));
        self.write(name, result)
    }
}
