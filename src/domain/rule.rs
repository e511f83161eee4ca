//! Rule AST data structures.
//!
//! This module defines the abstract syntax tree for trading rules:
//! - `Operand`: What can be compared (price fields, constants, indicators)
//! - `IndicatorRef`: Reference to an indicator with a specific field
//! - `IndicatorField`: Which field of a multi-value indicator to use
//! - `Rule`: comparison, band, composite, temporal and position-state variants,
//!   plus `Custom` for user-supplied predicates over the causal window

use std::fmt;
use std::sync::Arc;

use crate::domain::indicator::IndicatorType;
use crate::domain::rule_eval::CausalWindow;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Constant(f64),
    Indicator(IndicatorRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

impl IndicatorRef {
    pub fn value(indicator_type: IndicatorType) -> Self {
        IndicatorRef {
            indicator_type,
            field: IndicatorField::Value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    StochasticK,
    StochasticD,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    IchimokuTenkan,
    IchimokuKijun,
    IchimokuSenkouA,
    IchimokuSenkouB,
}

impl IndicatorField {
    /// DSL suffix for multi-value indicators, e.g. `_LINE` in `MACD_LINE`.
    fn suffix(&self) -> &'static str {
        match self {
            IndicatorField::Value => "",
            IndicatorField::MacdLine => "_LINE",
            IndicatorField::MacdSignal => "_SIGNAL",
            IndicatorField::MacdHistogram => "_HISTOGRAM",
            IndicatorField::StochasticK => "_K",
            IndicatorField::StochasticD => "_D",
            IndicatorField::BollingerUpper => "_UPPER",
            IndicatorField::BollingerMiddle => "_MIDDLE",
            IndicatorField::BollingerLower => "_LOWER",
            IndicatorField::IchimokuTenkan => "_TENKAN",
            IndicatorField::IchimokuKijun => "_KIJUN",
            IndicatorField::IchimokuSenkouA => "_SENKOU_A",
            IndicatorField::IchimokuSenkouB => "_SENKOU_B",
        }
    }
}

/// Signature of a user-supplied rule predicate.
pub type RulePredicate = dyn Fn(&CausalWindow<'_>) -> bool + Send + Sync;

/// A named pure predicate over the causal window.
///
/// Indicators the predicate reads must be declared with `reads` so they are
/// computed before the run starts.
#[derive(Clone)]
pub struct CustomRule {
    name: String,
    indicators: Vec<IndicatorType>,
    predicate: Arc<RulePredicate>,
}

impl CustomRule {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&CausalWindow<'_>) -> bool + Send + Sync + 'static,
    {
        CustomRule {
            name: name.into(),
            indicators: Vec::new(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn reads(mut self, indicator: IndicatorType) -> Self {
        self.indicators.push(indicator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indicators(&self) -> &[IndicatorType] {
        &self.indicators
    }

    pub(crate) fn call(&self, window: &CausalWindow<'_>) -> bool {
        (self.predicate)(window)
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .field("indicators", &self.indicators)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomRule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.predicate, &other.predicate)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    CrossBelow {
        left: Operand,
        right: Operand,
    },
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    Equals {
        left: Operand,
        right: Operand,
    },
    /// Operand closes above `upper` having been inside `[lower, upper]` on the
    /// previous bar.
    BreakoutUpper {
        operand: Operand,
        upper: Operand,
        lower: Operand,
    },
    /// Operand closes below `lower` having been inside the band on the
    /// previous bar.
    BreakoutLower {
        operand: Operand,
        upper: Operand,
        lower: Operand,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    Consecutive {
        rule: Box<Rule>,
        count: usize,
    },
    AnyOf {
        rule: Box<Rule>,
        count: usize,
    },
    /// The open position has been held for at least this many bars.
    HeldFor(usize),
    Custom(CustomRule),
}

impl Rule {
    /// Structural checks that the parser also enforces, for rules built in
    /// code.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Rule::Between { lower, upper, .. } if lower > upper => Err(format!(
                "BETWEEN lower bound {} exceeds upper bound {}",
                lower, upper
            )),
            Rule::And(rules) | Rule::Or(rules) => {
                if rules.len() < 2 {
                    return Err(format!(
                        "{} requires at least 2 rules",
                        if matches!(self, Rule::And(_)) { "AND" } else { "OR" }
                    ));
                }
                rules.iter().try_for_each(Rule::check)
            }
            Rule::Not(rule) => rule.check(),
            Rule::Consecutive { rule, count } | Rule::AnyOf { rule, count } => {
                if *count == 0 {
                    return Err("look-back count must be at least 1".to_string());
                }
                rule.check()
            }
            _ => Ok(()),
        }
    }
}

fn collect_operand(operand: &Operand, out: &mut Vec<IndicatorType>) {
    if let Operand::Indicator(ind_ref) = operand {
        if !out.contains(&ind_ref.indicator_type) {
            out.push(ind_ref.indicator_type.clone());
        }
    }
}

fn collect(rule: &Rule, out: &mut Vec<IndicatorType>) {
    match rule {
        Rule::CrossAbove { left, right }
        | Rule::CrossBelow { left, right }
        | Rule::Above { left, right }
        | Rule::Below { left, right }
        | Rule::Equals { left, right } => {
            collect_operand(left, out);
            collect_operand(right, out);
        }
        Rule::Between { operand, .. } => collect_operand(operand, out),
        Rule::BreakoutUpper {
            operand,
            upper,
            lower,
        }
        | Rule::BreakoutLower {
            operand,
            upper,
            lower,
        } => {
            collect_operand(operand, out);
            collect_operand(upper, out);
            collect_operand(lower, out);
        }
        Rule::And(rules) | Rule::Or(rules) => {
            for r in rules {
                collect(r, out);
            }
        }
        Rule::Not(rule) => collect(rule, out),
        Rule::Consecutive { rule, .. } | Rule::AnyOf { rule, .. } => collect(rule, out),
        Rule::HeldFor(_) => {}
        Rule::Custom(custom) => {
            for ind in custom.indicators() {
                if !out.contains(ind) {
                    out.push(ind.clone());
                }
            }
        }
    }
}

/// Every indicator a rule reads, deduplicated, in first-use order.
pub fn extract_indicators(rule: &Rule) -> Vec<IndicatorType> {
    let mut out = Vec::new();
    collect(rule, &mut out);
    out
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Open => f.write_str("open"),
            Operand::High => f.write_str("high"),
            Operand::Low => f.write_str("low"),
            Operand::Close => f.write_str("close"),
            Operand::Volume => f.write_str("volume"),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Indicator(ind_ref) => {
                let rendered = ind_ref.indicator_type.to_string();
                let suffix = ind_ref.field.suffix();
                match rendered.split_once('(') {
                    Some((name, args)) if !suffix.is_empty() => {
                        write!(f, "{}{}({}", name, suffix, args)
                    }
                    _ => f.write_str(&rendered),
                }
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |rules: &[Rule]| {
            rules
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Rule::CrossAbove { left, right } => write!(f, "CROSS_ABOVE({}, {})", left, right),
            Rule::CrossBelow { left, right } => write!(f, "CROSS_BELOW({}, {})", left, right),
            Rule::Above { left, right } => write!(f, "ABOVE({}, {})", left, right),
            Rule::Below { left, right } => write!(f, "BELOW({}, {})", left, right),
            Rule::Equals { left, right } => write!(f, "EQUALS({}, {})", left, right),
            Rule::Between {
                operand,
                lower,
                upper,
            } => write!(f, "BETWEEN({}, {}, {})", operand, lower, upper),
            Rule::BreakoutUpper {
                operand,
                upper,
                lower,
            } => write!(f, "BREAKOUT_UPPER({}, {}, {})", operand, upper, lower),
            Rule::BreakoutLower {
                operand,
                upper,
                lower,
            } => write!(f, "BREAKOUT_LOWER({}, {}, {})", operand, upper, lower),
            Rule::And(rules) => write!(f, "AND({})", join(rules)),
            Rule::Or(rules) => write!(f, "OR({})", join(rules)),
            Rule::Not(rule) => write!(f, "NOT({})", rule),
            Rule::Consecutive { rule, count } => write!(f, "CONSECUTIVE({}, {})", rule, count),
            Rule::AnyOf { rule, count } => write!(f, "ANY_OF({}, {})", rule, count),
            Rule::HeldFor(bars) => write!(f, "HELD_FOR({})", bars),
            Rule::Custom(custom) => write!(f, "CUSTOM[{}]", custom.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::PriceSource;

    fn sma(period: usize) -> Operand {
        Operand::Indicator(IndicatorRef::value(IndicatorType::Sma {
            period,
            source: PriceSource::Close,
        }))
    }

    #[test]
    fn operand_constant() {
        let c = Operand::Constant(100.5);
        assert_eq!(c, Operand::Constant(100.5));
        assert_ne!(c, Operand::Constant(99.0));
    }

    #[test]
    fn display_multi_value_operands() {
        let macd = Operand::Indicator(IndicatorRef {
            indicator_type: IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9,
            },
            field: IndicatorField::MacdHistogram,
        });
        assert_eq!(macd.to_string(), "MACD_HISTOGRAM(12,26,9)");

        let upper = Operand::Indicator(IndicatorRef {
            indicator_type: IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 250,
            },
            field: IndicatorField::BollingerUpper,
        });
        assert_eq!(upper.to_string(), "BOLLINGER_UPPER(20,2.5)");
    }

    #[test]
    fn display_nested_rule() {
        let rule = Rule::And(vec![
            Rule::CrossAbove {
                left: sma(10),
                right: sma(50),
            },
            Rule::Not(Box::new(Rule::HeldFor(3))),
        ]);
        assert_eq!(
            rule.to_string(),
            "AND(CROSS_ABOVE(SMA(10), SMA(50)), NOT(HELD_FOR(3)))"
        );
    }

    #[test]
    fn extract_indicators_deduplicates_in_order() {
        let rule = Rule::Or(vec![
            Rule::Above {
                left: sma(50),
                right: sma(10),
            },
            Rule::Below {
                left: Operand::Close,
                right: sma(50),
            },
        ]);
        let found = extract_indicators(&rule);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].to_string(), "SMA(50)");
        assert_eq!(found[1].to_string(), "SMA(10)");
    }

    #[test]
    fn extract_indicators_includes_custom_reads() {
        let custom = CustomRule::new("always", |_| true).reads(IndicatorType::Atr(14));
        let found = extract_indicators(&Rule::Custom(custom));
        assert_eq!(found, vec![IndicatorType::Atr(14)]);
    }

    #[test]
    fn custom_rule_equality_is_identity() {
        let a = CustomRule::new("x", |_| true);
        let b = CustomRule::new("x", |_| true);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn check_rejects_malformed_rules() {
        assert!(Rule::And(vec![Rule::HeldFor(1)]).check().is_err());
        assert!(Rule::Between {
            operand: Operand::Close,
            lower: 2.0,
            upper: 1.0
        }
        .check()
        .is_err());
        assert!(Rule::AnyOf {
            rule: Box::new(Rule::HeldFor(1)),
            count: 0
        }
        .check()
        .is_err());
        assert!(Rule::HeldFor(0).check().is_ok());
    }
}
