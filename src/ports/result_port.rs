//! Result sink port trait.

use std::path::PathBuf;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FxtraderError;
use crate::domain::optimizer::OptimizationResult;

/// Persists engine output. Returns where the result was written.
pub trait ResultPort {
    fn write_backtest(&self, result: &BacktestResult) -> Result<PathBuf, FxtraderError>;

    fn write_optimization(&self, result: &OptimizationResult) -> Result<PathBuf, FxtraderError>;
}
