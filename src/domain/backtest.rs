//! Backtest engine and event loop.
//!
//! Signals are filled on the open of the bar after the signal. An Exit on the
//! last bar, or a position still open when the data runs out, is closed at the
//! last close and flagged `ForcedClose`. Equity is marked to market on every
//! bar's close.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::error::FxtraderError;
use crate::domain::execution::{self, OpenPosition};
use crate::domain::metrics::{Metrics, MetricsOptions};
use crate::domain::position::{ExitReason, Trade, TradeOutcome};
use crate::domain::signal::{Signal, SignalAction, SignalGenerator, SignalReason};
use crate::domain::strategy::Strategy;
use crate::domain::timeseries::Timeseries;

/// How many units each position trades.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizing {
    /// `position_size` units on every trade.
    #[default]
    Fixed,
    /// Risk `risk_pct` percent of `account` between entry and stop:
    /// units = floor(account * risk_pct / 100 / stop distance).
    Risk { account: f64, risk_pct: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    /// Full bid/ask spread in price units; half is paid on each fill.
    pub spread: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    /// Units traded per position under fixed sizing.
    pub position_size: f64,
    pub sizing: PositionSizing,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            spread: 0.0,
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            position_size: 1.0,
            sizing: PositionSizing::Fixed,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), FxtraderError> {
        let non_negative = [
            ("spread", self.spread),
            ("commission_per_trade", self.commission_per_trade),
            ("commission_pct", self.commission_pct),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(FxtraderError::invalid_parameter(
                    name,
                    format!("must be a non-negative number, got {value}"),
                ));
            }
        }
        if !self.position_size.is_finite() || self.position_size <= 0.0 {
            return Err(FxtraderError::invalid_parameter(
                "position_size",
                format!("must be a positive number, got {}", self.position_size),
            ));
        }
        if let PositionSizing::Risk { account, risk_pct } = self.sizing {
            if !account.is_finite() || account <= 0.0 {
                return Err(FxtraderError::invalid_parameter(
                    "account",
                    format!("must be a positive number, got {account}"),
                ));
            }
            if !risk_pct.is_finite() || risk_pct <= 0.0 || risk_pct > 100.0 {
                return Err(FxtraderError::invalid_parameter(
                    "risk_pct",
                    format!("must be in (0, 100], got {risk_pct}"),
                ));
            }
        }
        Ok(())
    }

    /// Units for an entry whose stop sits `stop_distance` away. `None` when
    /// risk sizing has no usable stop or the risk buys less than one unit.
    pub fn units(&self, stop_distance: Option<f64>) -> Option<f64> {
        match self.sizing {
            PositionSizing::Fixed => Some(self.position_size),
            PositionSizing::Risk { account, risk_pct } => {
                let distance = stop_distance.filter(|d| d.is_finite() && *d > 0.0)?;
                let units = (account * risk_pct / 100.0 / distance).floor();
                (units >= 1.0).then_some(units)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Ledger {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Ledger {
    /// Cumulative P&L at the last bar; 0 for an empty run.
    pub fn final_equity(&self) -> f64 {
        self.equity_curve.last().map(|p| p.equity).unwrap_or(0.0)
    }
}

pub struct Backtester<'a> {
    series: &'a Timeseries,
    config: BacktestConfig,
}

impl<'a> Backtester<'a> {
    pub fn new(series: &'a Timeseries, config: BacktestConfig) -> Result<Self, FxtraderError> {
        config.validate()?;
        Ok(Backtester { series, config })
    }

    fn close_trade(
        &self,
        position: &OpenPosition,
        index: usize,
        market_price: f64,
        outcome: TradeOutcome,
        exit_reason: ExitReason,
    ) -> Trade {
        let bars = self.series.bars();
        let (exit_price, pnl) = execution::exit(position, market_price, &self.config);
        debug!(
            entry = position.entry_index,
            exit = index,
            pnl,
            ?outcome,
            "trade closed"
        );
        Trade {
            entry_index: position.entry_index,
            exit_index: index,
            entry_time: bars[position.entry_index].timestamp,
            exit_time: bars[index].timestamp,
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price,
            size: position.size,
            pnl,
            outcome,
            exit_reason,
        }
    }

    /// Replay `signals` (ascending bar index) against the series.
    pub fn run(&self, signals: impl IntoIterator<Item = Signal>) -> Ledger {
        let bars = self.series.bars();
        let n = bars.len();
        let mut ledger = Ledger {
            trades: Vec::new(),
            equity_curve: Vec::with_capacity(n),
        };
        if n == 0 {
            return ledger;
        }

        let mut signals = signals.into_iter().peekable();
        let mut pending: Option<Signal> = None;
        let mut open: Option<OpenPosition> = None;
        let mut realized = 0.0;

        for (i, bar) in bars.iter().enumerate() {
            // Fill the order from the previous bar at this bar's open.
            if let Some(order) = pending.take() {
                match (order.action, open.take()) {
                    (SignalAction::Enter, None) => match self.config.units(order.stop_distance) {
                        Some(size) => {
                            let position =
                                execution::enter(order.direction, bar.open, i, size, &self.config);
                            debug!(
                                index = i,
                                price = position.entry_price,
                                size,
                                "position opened"
                            );
                            open = Some(position);
                        }
                        None => {
                            warn!(
                                index = order.index,
                                stop = ?order.stop_distance,
                                "no position size for entry, skipped"
                            );
                        }
                    },
                    (SignalAction::Exit, Some(position)) => {
                        let reason = exit_reason(order.reason);
                        let trade = self.close_trade(
                            &position,
                            i,
                            bar.open,
                            TradeOutcome::Normal,
                            reason,
                        );
                        realized += trade.pnl;
                        ledger.trades.push(trade);
                    }
                    (action, current) => {
                        warn!(
                            index = order.index,
                            ?action,
                            "signal does not match position state, ignored"
                        );
                        open = current;
                    }
                }
            }

            while let Some(signal) = signals.next_if(|s| s.index <= i) {
                if signal.index < i {
                    warn!(index = signal.index, "out-of-order signal ignored");
                    continue;
                }
                if i + 1 < n {
                    pending = Some(signal);
                } else if signal.action == SignalAction::Enter {
                    warn!(index = i, "enter signal on the final bar dropped");
                } else if let Some(position) = open.take() {
                    let trade = self.close_trade(
                        &position,
                        i,
                        bar.close,
                        TradeOutcome::ForcedClose,
                        exit_reason(signal.reason),
                    );
                    realized += trade.pnl;
                    ledger.trades.push(trade);
                }
            }

            if i + 1 == n {
                if let Some(position) = open.take() {
                    let trade = self.close_trade(
                        &position,
                        i,
                        bar.close,
                        TradeOutcome::ForcedClose,
                        ExitReason::EndOfData,
                    );
                    realized += trade.pnl;
                    ledger.trades.push(trade);
                }
            }

            let unrealized = open
                .as_ref()
                .map(|p| execution::mark_to_market(p.entry_price, bar.close, p.direction, p.size))
                .unwrap_or(0.0);
            ledger.equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: realized + unrealized,
            });
        }

        ledger
    }
}

fn exit_reason(reason: SignalReason) -> ExitReason {
    match reason {
        SignalReason::Rule => ExitReason::Rule,
        SignalReason::StopLoss => ExitReason::StopLoss,
    }
}

/// Everything one strategy run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub instrument: String,
    pub signals: Vec<Signal>,
    pub ledger: Ledger,
    pub metrics: Metrics,
}

/// Signals → ledger → metrics for a strategy that is already known to fit the
/// series.
pub(crate) fn simulate(
    series: &Timeseries,
    strategy: &Strategy,
    config: &BacktestConfig,
    options: &MetricsOptions,
) -> Result<BacktestResult, FxtraderError> {
    if matches!(config.sizing, PositionSizing::Risk { .. }) && strategy.stop_loss().is_none() {
        return Err(FxtraderError::invalid_parameter(
            "sizing",
            "risk sizing needs a strategy stop loss",
        ));
    }
    let generator = SignalGenerator::new(series, strategy);
    let signals: Vec<Signal> = generator.signals().collect();
    let ledger = Backtester::new(series, config.clone())?.run(signals.iter().copied());
    let metrics = Metrics::compute(&ledger, options);
    Ok(BacktestResult {
        strategy: strategy.name().to_string(),
        instrument: series.instrument().to_string(),
        signals,
        ledger,
        metrics,
    })
}

/// Run one strategy over one series: the engine as a pure function of
/// (series, strategy, configuration).
pub fn run_backtest(
    series: &Timeseries,
    strategy: &Strategy,
    config: &BacktestConfig,
    options: &MetricsOptions,
) -> Result<BacktestResult, FxtraderError> {
    let warmup = strategy.warmup();
    if series.len() <= warmup {
        return Err(FxtraderError::InsufficientData {
            bars: series.len(),
            required: warmup + 1,
        });
    }
    let result = simulate(series, strategy, config, options)?;
    info!(
        strategy = strategy.name(),
        instrument = series.instrument(),
        bars = series.len(),
        trades = result.ledger.trades.len(),
        total_return = result.metrics.total_return,
        "backtest complete"
    );
    Ok(result)
}
