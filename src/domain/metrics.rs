//! Performance metrics computed from a ledger.
//!
//! Figures are in price units × size, not percentages: the engine has no
//! notion of account capital. Undefined statistics are NaN, never 0.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::backtest::{EquityPoint, Ledger};
use super::position::Trade;

const FLAT_VOLATILITY: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsOptions {
    /// Leave `ForcedClose` trades out of the trade statistics. Equity-based
    /// figures always use the full curve.
    pub exclude_forced_close: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    /// Longest run of bars spent below a previous equity peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub loss_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_consecutive_losses: usize,
    pub avg_consecutive_losses: f64,
    /// Mean bars from entry fill to exit fill.
    pub avg_trade_duration: f64,
    pub forced_closes: usize,
}

impl Metrics {
    pub fn compute(ledger: &Ledger, options: &MetricsOptions) -> Self {
        let equity_curve = &ledger.equity_curve;
        let forced_closes = ledger.trades.iter().filter(|t| t.is_forced_close()).count();
        let trades: Vec<&Trade> = ledger
            .trades
            .iter()
            .filter(|t| !(options.exclude_forced_close && t.is_forced_close()))
            .collect();

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = f64::NAN;
        let mut largest_loss = f64::NAN;
        let mut total_duration = 0usize;
        let mut loss_runs: Vec<usize> = Vec::new();
        let mut current_run = 0usize;

        for trade in &trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }

            if pnl < 0.0 {
                current_run += 1;
            } else if current_run > 0 {
                loss_runs.push(current_run);
                current_run = 0;
            }

            total_duration += trade.bars_held();
        }
        if current_run > 0 {
            loss_runs.push(current_run);
        }

        let total_trades = trades.len();
        let ratio = |count: usize, over: usize| {
            if over > 0 {
                count as f64 / over as f64
            } else {
                f64::NAN
            }
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else {
            f64::NAN
        };

        let expectancy = if total_trades > 0 {
            trades.iter().map(|t| t.pnl).sum::<f64>() / total_trades as f64
        } else {
            f64::NAN
        };

        let avg_consecutive_losses = if loss_runs.is_empty() {
            f64::NAN
        } else {
            loss_runs.iter().sum::<usize>() as f64 / loss_runs.len() as f64
        };

        Metrics {
            total_return: ledger.final_equity(),
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate: ratio(trades_won, total_trades),
            loss_rate: ratio(trades_lost, total_trades),
            profit_factor,
            expectancy,
            avg_win: if trades_won > 0 {
                total_wins / trades_won as f64
            } else {
                f64::NAN
            },
            avg_loss: if trades_lost > 0 {
                total_losses / trades_lost as f64
            } else {
                f64::NAN
            },
            largest_win,
            largest_loss,
            max_consecutive_losses: loss_runs.iter().copied().max().unwrap_or(0),
            avg_consecutive_losses,
            avg_trade_duration: ratio(total_duration, total_trades),
            forced_closes,
        }
    }

    /// Value of the field named by `rank_by`.
    pub fn get(&self, rank_by: RankBy) -> f64 {
        match rank_by {
            RankBy::TotalReturn => self.total_return,
            RankBy::SharpeRatio => self.sharpe_ratio,
            RankBy::SortinoRatio => self.sortino_ratio,
            RankBy::MaxDrawdown => self.max_drawdown,
            RankBy::WinRate => self.win_rate,
            RankBy::ProfitFactor => self.profit_factor,
            RankBy::Expectancy => self.expectancy,
            RankBy::TotalTrades => self.total_trades as f64,
        }
    }
}

/// Peak-to-trough decline in absolute units, with the peak starting at the
/// zero baseline, and the longest underwater stretch in bars.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else {
            max_dd = max_dd.max(peak - point.equity);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

/// Sharpe and Sortino over per-bar equity changes, unannualized.
fn compute_risk_adjusted(equity_curve: &[EquityPoint]) -> (f64, f64) {
    let changes: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| w[1].equity - w[0].equity)
        .collect();

    if changes.len() < 2 {
        return (f64::NAN, f64::NAN);
    }

    let n = changes.len() as f64;
    let mean: f64 = changes.iter().sum::<f64>() / n;
    let variance: f64 = changes.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let sharpe = if stddev > FLAT_VOLATILITY {
        mean / stddev
    } else {
        f64::NAN
    };

    let downside_variance: f64 = changes
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside_variance.sqrt();

    let sortino = if downside_stddev > FLAT_VOLATILITY {
        mean / downside_stddev
    } else {
        f64::NAN
    };

    (sharpe, sortino)
}

/// Metric used to order optimizer candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    TotalReturn,
    SharpeRatio,
    SortinoRatio,
    MaxDrawdown,
    WinRate,
    ProfitFactor,
    Expectancy,
    TotalTrades,
}

impl RankBy {
    pub const ALL: [RankBy; 8] = [
        RankBy::TotalReturn,
        RankBy::SharpeRatio,
        RankBy::SortinoRatio,
        RankBy::MaxDrawdown,
        RankBy::WinRate,
        RankBy::ProfitFactor,
        RankBy::Expectancy,
        RankBy::TotalTrades,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankBy::TotalReturn => "total_return",
            RankBy::SharpeRatio => "sharpe_ratio",
            RankBy::SortinoRatio => "sortino_ratio",
            RankBy::MaxDrawdown => "max_drawdown",
            RankBy::WinRate => "win_rate",
            RankBy::ProfitFactor => "profit_factor",
            RankBy::Expectancy => "expectancy",
            RankBy::TotalTrades => "total_trades",
        }
    }
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        RankBy::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = RankBy::ALL.iter().map(RankBy::as_str).collect();
                format!("unknown metric '{s}', expected one of: {}", known.join(", "))
            })
    }
}
