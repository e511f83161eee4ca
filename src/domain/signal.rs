//! Signal generation.
//!
//! Walks a series bar by bar with a `Flat | Long | Short` state machine and
//! yields a `Signal` on every state transition. Each bar gets a causal window
//! ending at that bar; nothing later is reachable from the rules.

use serde::Serialize;
use tracing::debug;

use crate::domain::indicator::{IndicatorSet, IndicatorType, IndicatorValue};
use crate::domain::position::{Direction, PositionState};
use crate::domain::rule::Rule;
use crate::domain::rule_eval::{evaluate, CausalWindow};
use crate::domain::strategy::{StopLoss, Strategy};
use crate::domain::timeseries::Timeseries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalAction {
    Enter,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalReason {
    Rule,
    StopLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Signal {
    pub index: usize,
    pub action: SignalAction,
    pub direction: Direction,
    pub reason: SignalReason,
    /// Distance from the signal bar's close to the stop level, set on entries
    /// of strategies with a stop loss.
    pub stop_distance: Option<f64>,
}

/// Runs one strategy over one series. Indicators are computed once in `new`;
/// `signals()` can be called any number of times and replays identically.
#[derive(Debug)]
pub struct SignalGenerator<'a> {
    series: &'a Timeseries,
    strategy: &'a Strategy,
    indicators: IndicatorSet,
}

impl<'a> SignalGenerator<'a> {
    pub fn new(series: &'a Timeseries, strategy: &'a Strategy) -> Self {
        let indicators = IndicatorSet::compute(series, strategy.indicators());
        SignalGenerator {
            series,
            strategy,
            indicators,
        }
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }

    pub fn signals(&self) -> Signals<'_> {
        Signals {
            generator: self,
            index: 0,
            position: PositionState::Flat,
            stop_level: None,
        }
    }

    fn window(&self, index: usize, position: PositionState) -> CausalWindow<'_> {
        CausalWindow::new(self.series.bars(), &self.indicators, index, position)
    }

    /// Stop distance for a position opened by a signal on `index`. `None`
    /// when the strategy has no stop or the ATR is still warming up.
    fn stop_distance(&self, window: &CausalWindow<'_>) -> Option<f64> {
        match self.strategy.stop_loss()? {
            StopLoss::Fixed { distance } => Some(*distance),
            StopLoss::Atr { period, multiplier } => {
                match window.indicator(&IndicatorType::Atr(*period), 0)? {
                    IndicatorValue::Simple(atr) => Some(atr * multiplier),
                    _ => None,
                }
            }
        }
    }
}

impl<'g, 'a> IntoIterator for &'g SignalGenerator<'a> {
    type Item = Signal;
    type IntoIter = Signals<'g>;

    fn into_iter(self) -> Self::IntoIter {
        self.signals()
    }
}

/// Lazy, finite signal sequence from one pass over the series.
#[derive(Debug, Clone)]
pub struct Signals<'g> {
    generator: &'g SignalGenerator<'g>,
    index: usize,
    position: PositionState,
    stop_level: Option<f64>,
}

fn rule_fires(rule: Option<&Rule>, window: &CausalWindow<'_>) -> bool {
    rule.is_some_and(|r| evaluate(r, window))
}

impl Signals<'_> {
    fn step(&mut self, index: usize) -> Option<Signal> {
        let generator = self.generator;
        let strategy = generator.strategy;

        match self.position {
            PositionState::Flat => {
                let window = generator.window(index, PositionState::Flat);
                let direction = if rule_fires(strategy.entry_long(), &window) {
                    Direction::Long
                } else if rule_fires(strategy.entry_short(), &window) {
                    Direction::Short
                } else {
                    return None;
                };
                let stop_distance = generator.stop_distance(&window);
                let reference = window.current().close;
                self.position = PositionState::open(direction, index);
                self.stop_level = stop_distance.map(|d| reference - direction.sign() * d);
                debug!(index, ?direction, stop = ?self.stop_level, "enter signal");
                Some(Signal {
                    index,
                    action: SignalAction::Enter,
                    direction,
                    reason: SignalReason::Rule,
                    stop_distance,
                })
            }
            PositionState::Long { since } | PositionState::Short { since } => {
                // The position fills on the bar after its signal.
                if index <= since {
                    return None;
                }
                let direction = self.position.direction()?;
                let window = generator.window(index, self.position);
                let bar = window.current();
                let stopped = self.stop_level.is_some_and(|level| match direction {
                    Direction::Long => bar.low <= level,
                    Direction::Short => bar.high >= level,
                });

                let reason = if stopped {
                    SignalReason::StopLoss
                } else {
                    let exit_rule = match direction {
                        Direction::Long => strategy.exit_long(),
                        Direction::Short => strategy.exit_short(),
                    };
                    if !rule_fires(exit_rule, &window) {
                        return None;
                    }
                    SignalReason::Rule
                };

                self.position = PositionState::Flat;
                self.stop_level = None;
                debug!(index, ?direction, ?reason, "exit signal");
                Some(Signal {
                    index,
                    action: SignalAction::Exit,
                    direction,
                    reason,
                    stop_distance: None,
                })
            }
        }
    }
}

impl Iterator for Signals<'_> {
    type Item = Signal;

    fn next(&mut self) -> Option<Signal> {
        while self.index < self.generator.series.len() {
            let index = self.index;
            self.index += 1;
            if let Some(signal) = self.step(index) {
                return Some(signal);
            }
        }
        None
    }
}
