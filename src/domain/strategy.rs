//! Strategy configuration and composition.
//!
//! A `Strategy` is immutable once built. `StrategyBuilder::build` is the only
//! way to make one, and it rejects malformed rules, out-of-domain indicator
//! parameters and bad stop-loss settings before any bar is simulated.

use serde::Serialize;
use std::fmt;

use crate::domain::error::FxtraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::parameter::{ParameterSet, ParameterValue};
use crate::domain::rule::{extract_indicators, Rule};

/// Protective stop, placed relative to the close of the entry-signal bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StopLoss {
    /// Fixed price distance, e.g. 0.0020 for 20 pips on EUR/USD.
    Fixed { distance: f64 },
    /// `multiplier` × ATR(`period`) at the entry-signal bar.
    Atr { period: usize, multiplier: f64 },
}

impl StopLoss {
    fn validate(&self) -> Result<(), FxtraderError> {
        match self {
            StopLoss::Fixed { distance } => {
                if !distance.is_finite() || *distance <= 0.0 {
                    return Err(FxtraderError::invalid_parameter(
                        "stop_loss.distance",
                        format!("must be a positive number, got {distance}"),
                    ));
                }
            }
            StopLoss::Atr { period, multiplier } => {
                if *period == 0 {
                    return Err(FxtraderError::invalid_parameter(
                        "stop_loss.period",
                        "must be at least 1",
                    ));
                }
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(FxtraderError::invalid_parameter(
                        "stop_loss.multiplier",
                        format!("must be a positive number, got {multiplier}"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn indicator(&self) -> Option<IndicatorType> {
        match self {
            StopLoss::Fixed { .. } => None,
            StopLoss::Atr { period, .. } => Some(IndicatorType::Atr(*period)),
        }
    }

    /// Parse `FIXED(distance)` or `ATR(period, multiplier)`. Arguments may be
    /// `$name` placeholders resolved from `params`.
    pub fn parse(text: &str, params: Option<&ParameterSet>) -> Result<StopLoss, FxtraderError> {
        let invalid = |reason: String| FxtraderError::RuleInvalid {
            reason: format!("stop loss '{}': {}", text.trim(), reason),
        };
        let trimmed = text.trim();
        let (kind, rest) = trimmed
            .split_once('(')
            .ok_or_else(|| invalid("expected FIXED(distance) or ATR(period, multiplier)".into()))?;
        let args = rest
            .strip_suffix(')')
            .ok_or_else(|| invalid("expected ')'".into()))?;
        let values = args
            .split(',')
            .map(|raw| resolve_arg(raw.trim(), params).map_err(&invalid))
            .collect::<Result<Vec<_>, _>>()?;

        let number = |v: &ParameterValue| {
            v.as_f64()
                .ok_or_else(|| invalid(format!("expected a number, got '{v}'")))
        };

        match (kind.trim().to_ascii_uppercase().as_str(), values.as_slice()) {
            ("FIXED", [distance]) => Ok(StopLoss::Fixed {
                distance: number(distance)?,
            }),
            ("ATR", [period, multiplier]) => Ok(StopLoss::Atr {
                period: period
                    .as_usize()
                    .ok_or_else(|| invalid(format!("expected an integer period, got '{period}'")))?,
                multiplier: number(multiplier)?,
            }),
            _ => Err(invalid(
                "expected FIXED(distance) or ATR(period, multiplier)".into(),
            )),
        }
    }

    /// `$name` placeholders used by a stop-loss expression.
    pub fn placeholders(text: &str) -> Vec<String> {
        text.split(|c: char| c == '(' || c == ',' || c == ')')
            .filter_map(|part| part.trim().strip_prefix('$'))
            .map(|name| name.to_ascii_lowercase())
            .collect()
    }
}

fn resolve_arg(raw: &str, params: Option<&ParameterSet>) -> Result<ParameterValue, String> {
    match raw.strip_prefix('$') {
        Some(name) => {
            let name = name.to_ascii_lowercase();
            params
                .and_then(|p| p.get(&name))
                .cloned()
                .ok_or_else(|| format!("no value bound for parameter '${name}'"))
        }
        None if raw.is_empty() => Err("missing argument".to_string()),
        None => Ok(ParameterValue::parse_literal(raw)),
    }
}

impl fmt::Display for StopLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopLoss::Fixed { distance } => write!(f, "FIXED({})", distance),
            StopLoss::Atr { period, multiplier } => write!(f, "ATR({}, {})", period, multiplier),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    name: String,
    entry_long: Option<Rule>,
    exit_long: Option<Rule>,
    entry_short: Option<Rule>,
    exit_short: Option<Rule>,
    stop_loss: Option<StopLoss>,
    indicators: Vec<IndicatorType>,
}

impl Strategy {
    pub fn builder(name: impl Into<String>) -> StrategyBuilder {
        StrategyBuilder {
            name: name.into(),
            ..StrategyBuilder::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_long(&self) -> Option<&Rule> {
        self.entry_long.as_ref()
    }

    pub fn exit_long(&self) -> Option<&Rule> {
        self.exit_long.as_ref()
    }

    pub fn entry_short(&self) -> Option<&Rule> {
        self.entry_short.as_ref()
    }

    pub fn exit_short(&self) -> Option<&Rule> {
        self.exit_short.as_ref()
    }

    pub fn stop_loss(&self) -> Option<&StopLoss> {
        self.stop_loss.as_ref()
    }

    /// Every indicator the rules and stop loss read, deduplicated.
    pub fn indicators(&self) -> &[IndicatorType] {
        &self.indicators
    }

    /// Longest indicator warm-up; 0 for indicator-free strategies.
    pub fn warmup(&self) -> usize {
        self.indicators
            .iter()
            .map(IndicatorType::warmup)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrategyBuilder {
    name: String,
    entry_long: Option<Rule>,
    exit_long: Option<Rule>,
    entry_short: Option<Rule>,
    exit_short: Option<Rule>,
    stop_loss: Option<StopLoss>,
}

impl StrategyBuilder {
    pub fn long(mut self, entry: Rule, exit: Rule) -> Self {
        self.entry_long = Some(entry);
        self.exit_long = Some(exit);
        self
    }

    pub fn short(mut self, entry: Rule, exit: Rule) -> Self {
        self.entry_short = Some(entry);
        self.exit_short = Some(exit);
        self
    }

    pub fn stop_loss(mut self, stop_loss: StopLoss) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn build(self) -> Result<Strategy, FxtraderError> {
        if self.name.trim().is_empty() {
            return Err(FxtraderError::RuleInvalid {
                reason: "strategy name must not be empty".into(),
            });
        }
        if self.entry_long.is_none() && self.entry_short.is_none() {
            return Err(FxtraderError::RuleInvalid {
                reason: format!("strategy '{}' has no entry rule", self.name),
            });
        }

        let rules = [
            ("entry_long", &self.entry_long),
            ("exit_long", &self.exit_long),
            ("entry_short", &self.entry_short),
            ("exit_short", &self.exit_short),
        ];
        let mut indicators: Vec<IndicatorType> = Vec::new();
        for (label, rule) in rules {
            let Some(rule) = rule else { continue };
            rule.check().map_err(|reason| FxtraderError::RuleInvalid {
                reason: format!("{label}: {reason}"),
            })?;
            for ind in extract_indicators(rule) {
                if !indicators.contains(&ind) {
                    indicators.push(ind);
                }
            }
        }

        if let Some(stop_loss) = &self.stop_loss {
            stop_loss.validate()?;
            if let Some(ind) = stop_loss.indicator() {
                if !indicators.contains(&ind) {
                    indicators.push(ind);
                }
            }
        }

        for ind in &indicators {
            ind.validate()?;
        }

        Ok(Strategy {
            name: self.name,
            entry_long: self.entry_long,
            exit_long: self.exit_long,
            entry_short: self.entry_short,
            exit_short: self.exit_short,
            stop_loss: self.stop_loss,
            indicators,
        })
    }
}
