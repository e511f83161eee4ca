//! Parameterized strategy templates.
//!
//! A template declares parameter names and turns one `ParameterSet` into a
//! concrete `Strategy`. The optimizer instantiates a template once per
//! candidate.

use std::fmt;
use std::sync::Arc;

use crate::domain::error::FxtraderError;
use crate::domain::parameter::{ParameterSet, ParameterValue};
use crate::domain::rule_parser::{parse_with_params, placeholders};
use crate::domain::strategy::{StopLoss, Strategy};

pub trait StrategyTemplate: Send + Sync {
    fn name(&self) -> &str;

    /// Declared parameter names, in declaration order.
    fn parameters(&self) -> &[String];

    fn instantiate(&self, params: &ParameterSet) -> Result<Strategy, FxtraderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintTerm {
    Parameter(String),
    Constant(f64),
}

impl ConstraintTerm {
    fn parse(raw: &str) -> Result<ConstraintTerm, String> {
        let raw = raw.trim();
        let name = raw.strip_prefix('$').unwrap_or(raw);
        if name.is_empty() {
            return Err("missing operand".to_string());
        }
        if let Ok(v) = name.parse::<f64>() {
            return Ok(ConstraintTerm::Constant(v));
        }
        if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(ConstraintTerm::Parameter(name.to_ascii_lowercase()))
        } else {
            Err(format!("invalid operand '{raw}'"))
        }
    }

    fn resolve(&self, params: &ParameterSet) -> Option<f64> {
        match self {
            ConstraintTerm::Parameter(name) => params.get(name).and_then(ParameterValue::as_f64),
            ConstraintTerm::Constant(v) => Some(*v),
        }
    }
}

impl fmt::Display for ConstraintTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintTerm::Parameter(name) => f.write_str(name),
            ConstraintTerm::Constant(v) => write!(f, "{}", v),
        }
    }
}

/// Cross-parameter constraint such as `fast < slow`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub left: ConstraintTerm,
    pub op: CompareOp,
    pub right: ConstraintTerm,
}

impl Constraint {
    pub fn parse(text: &str) -> Result<Constraint, FxtraderError> {
        let invalid = |reason: String| FxtraderError::RuleInvalid {
            reason: format!("constraint '{}': {}", text.trim(), reason),
        };
        // Two-character operators first so "<=" is not read as "<".
        const OPS: [(&str, CompareOp); 6] = [
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ];
        let (left, op, right) = OPS
            .iter()
            .find_map(|(sym, op)| text.split_once(sym).map(|(l, r)| (l, *op, r)))
            .ok_or_else(|| invalid("expected a comparison such as 'fast < slow'".into()))?;
        Ok(Constraint {
            left: ConstraintTerm::parse(left).map_err(&invalid)?,
            op,
            right: ConstraintTerm::parse(right).map_err(&invalid)?,
        })
    }

    fn parameter_names(&self) -> impl Iterator<Item = &str> {
        [&self.left, &self.right].into_iter().filter_map(|t| match t {
            ConstraintTerm::Parameter(name) => Some(name.as_str()),
            ConstraintTerm::Constant(_) => None,
        })
    }

    /// `None` when a side is unbound or not numeric.
    pub fn is_satisfied(&self, params: &ParameterSet) -> Option<bool> {
        let left = self.left.resolve(params)?;
        let right = self.right.resolve(params)?;
        Some(self.op.holds(left, right))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op.symbol(), self.right)
    }
}

/// Strategy template written in the rule language, with `$name` placeholders.
#[derive(Debug, Clone)]
pub struct RuleTemplate {
    name: String,
    entry_long: Option<String>,
    exit_long: Option<String>,
    entry_short: Option<String>,
    exit_short: Option<String>,
    stop_loss: Option<String>,
    constraints: Vec<Constraint>,
    parameters: Vec<String>,
}

impl RuleTemplate {
    pub fn builder(name: impl Into<String>) -> RuleTemplateBuilder {
        RuleTemplateBuilder {
            name: name.into(),
            ..RuleTemplateBuilder::default()
        }
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleTemplateBuilder {
    name: String,
    entry_long: Option<String>,
    exit_long: Option<String>,
    entry_short: Option<String>,
    exit_short: Option<String>,
    stop_loss: Option<String>,
    constraints: Vec<String>,
}

impl RuleTemplateBuilder {
    pub fn long(mut self, entry: impl Into<String>, exit: impl Into<String>) -> Self {
        self.entry_long = Some(entry.into());
        self.exit_long = Some(exit.into());
        self
    }

    pub fn short(mut self, entry: impl Into<String>, exit: impl Into<String>) -> Self {
        self.entry_short = Some(entry.into());
        self.exit_short = Some(exit.into());
        self
    }

    pub fn stop_loss(mut self, text: impl Into<String>) -> Self {
        self.stop_loss = Some(text.into());
        self
    }

    pub fn constraint(mut self, text: impl Into<String>) -> Self {
        self.constraints.push(text.into());
        self
    }

    /// Check rule syntax and collect placeholders. Parameters are declared in
    /// first-use order across entry long, exit long, entry short, exit short
    /// and the stop loss.
    pub fn build(self) -> Result<RuleTemplate, FxtraderError> {
        if self.entry_long.is_none() && self.entry_short.is_none() {
            return Err(FxtraderError::RuleInvalid {
                reason: format!("template '{}' has no entry rule", self.name),
            });
        }

        let mut parameters: Vec<String> = Vec::new();
        let mut declare = |names: Vec<String>| {
            for name in names {
                if !parameters.contains(&name) {
                    parameters.push(name);
                }
            }
        };
        for text in [
            &self.entry_long,
            &self.exit_long,
            &self.entry_short,
            &self.exit_short,
        ]
        .into_iter()
        .flatten()
        {
            declare(placeholders(text)?);
        }
        if let Some(text) = &self.stop_loss {
            declare(StopLoss::placeholders(text));
        }

        let constraints = self
            .constraints
            .iter()
            .map(|c| Constraint::parse(c))
            .collect::<Result<Vec<_>, _>>()?;
        for constraint in &constraints {
            if let Some(unknown) = constraint
                .parameter_names()
                .find(|name| !parameters.iter().any(|p| p == name))
            {
                return Err(FxtraderError::RuleInvalid {
                    reason: format!(
                        "constraint '{constraint}' refers to undeclared parameter '{unknown}'"
                    ),
                });
            }
        }

        Ok(RuleTemplate {
            name: self.name,
            entry_long: self.entry_long,
            exit_long: self.exit_long,
            entry_short: self.entry_short,
            exit_short: self.exit_short,
            stop_loss: self.stop_loss,
            constraints,
            parameters,
        })
    }
}

impl StrategyTemplate for RuleTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[String] {
        &self.parameters
    }

    fn instantiate(&self, params: &ParameterSet) -> Result<Strategy, FxtraderError> {
        if let Some(missing) = self.parameters.iter().find(|p| params.get(p).is_none()) {
            return Err(FxtraderError::invalid_parameter(
                missing.as_str(),
                "no value bound",
            ));
        }
        for constraint in &self.constraints {
            match constraint.is_satisfied(params) {
                Some(true) => {}
                Some(false) => {
                    return Err(FxtraderError::invalid_parameter(
                        constraint.to_string(),
                        format!("constraint violated by {params}"),
                    ));
                }
                None => {
                    return Err(FxtraderError::invalid_parameter(
                        constraint.to_string(),
                        "constraint needs numeric parameter values",
                    ));
                }
            }
        }

        let rule = |text: &Option<String>| {
            text.as_deref()
                .map(|t| parse_with_params(t, params))
                .transpose()
        };
        let name = if params.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, params)
        };
        let mut builder = Strategy::builder(name);
        if let (Some(entry), Some(exit)) = (rule(&self.entry_long)?, rule(&self.exit_long)?) {
            builder = builder.long(entry, exit);
        }
        if let (Some(entry), Some(exit)) = (rule(&self.entry_short)?, rule(&self.exit_short)?) {
            builder = builder.short(entry, exit);
        }
        if let Some(text) = &self.stop_loss {
            builder = builder.stop_loss(StopLoss::parse(text, Some(params))?);
        }
        builder.build()
    }
}

type BuildFn = dyn Fn(&ParameterSet) -> Result<Strategy, FxtraderError> + Send + Sync;

/// Template backed by a closure, for strategies that need `Custom` rules.
#[derive(Clone)]
pub struct FnTemplate {
    name: String,
    parameters: Vec<String>,
    build: Arc<BuildFn>,
}

impl FnTemplate {
    pub fn new<I, S, F>(name: impl Into<String>, parameters: I, build: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&ParameterSet) -> Result<Strategy, FxtraderError> + Send + Sync + 'static,
    {
        FnTemplate {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            build: Arc::new(build),
        }
    }
}

impl fmt::Debug for FnTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTemplate")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl StrategyTemplate for FnTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[String] {
        &self.parameters
    }

    fn instantiate(&self, params: &ParameterSet) -> Result<Strategy, FxtraderError> {
        (self.build)(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{CustomRule, Rule};

    fn sma_cross() -> RuleTemplate {
        RuleTemplate::builder("SMA Crossover")
            .long(
                "CROSS_ABOVE(SMA($fast), SMA($slow))",
                "CROSS_BELOW(SMA($fast), SMA($slow))",
            )
            .constraint("fast < slow")
            .build()
            .unwrap()
    }

    #[test]
    fn declares_placeholders_in_first_use_order() {
        let template = RuleTemplate::builder("RSI")
            .long("BELOW(RSI($period), $oversold)", "ABOVE(RSI($period), $exit)")
            .stop_loss("ATR($atr, 2)")
            .build()
            .unwrap();
        assert_eq!(template.parameters(), ["period", "oversold", "exit", "atr"]);
    }

    #[test]
    fn instantiates_with_bound_values() {
        let template = sma_cross();
        let params = ParameterSet::new().with("fast", 10).with("slow", 50);
        let strategy = template.instantiate(&params).unwrap();
        assert_eq!(strategy.name(), "SMA Crossover {fast=10, slow=50}");
        assert_eq!(strategy.indicators().len(), 2);
        assert_eq!(strategy.warmup(), 49);
    }

    #[test]
    fn parameterless_template_keeps_its_name() {
        let template = RuleTemplate::builder("Threshold")
            .long("ABOVE(close, 1.1)", "BELOW(close, 1.05)")
            .build()
            .unwrap();
        assert!(template.parameters().is_empty());
        let strategy = template.instantiate(&ParameterSet::new()).unwrap();
        assert_eq!(strategy.name(), "Threshold");
    }

    #[test]
    fn constraint_violation_is_invalid_parameter() {
        let template = sma_cross();
        let params = ParameterSet::new().with("fast", 50).with("slow", 10);
        let err = template.instantiate(&params).unwrap_err();
        match err {
            FxtraderError::InvalidParameter { name, reason } => {
                assert_eq!(name, "fast < slow");
                assert!(reason.contains("fast=50"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_parameter_value() {
        let template = sma_cross();
        let params = ParameterSet::new().with("fast", 5);
        assert!(matches!(
            template.instantiate(&params),
            Err(FxtraderError::InvalidParameter { name, .. }) if name == "slow"
        ));
    }

    #[test]
    fn out_of_domain_indicator_value() {
        let template = RuleTemplate::builder("SMA")
            .long("ABOVE(close, SMA($n))", "BELOW(close, SMA($n))")
            .build()
            .unwrap();
        let err = template
            .instantiate(&ParameterSet::new().with("n", 0))
            .unwrap_err();
        assert!(matches!(err, FxtraderError::InvalidParameter { .. }));
    }

    #[test]
    fn syntax_errors_surface_at_build() {
        let err = RuleTemplate::builder("Broken")
            .long("ABOVE(close", "BELOW(close, 1)")
            .build()
            .unwrap_err();
        assert!(matches!(err, FxtraderError::RuleParse(_)));
    }

    #[test]
    fn constraint_must_use_declared_parameters() {
        let err = RuleTemplate::builder("SMA")
            .long("ABOVE(close, SMA($n))", "BELOW(close, SMA($n))")
            .constraint("n < m")
            .build()
            .unwrap_err();
        assert!(matches!(err, FxtraderError::RuleInvalid { .. }));
    }

    #[test]
    fn constraint_parsing() {
        let c = Constraint::parse(" $fast <= 20 ").unwrap();
        assert_eq!(c.op, CompareOp::Le);
        assert_eq!(c.right, ConstraintTerm::Constant(20.0));
        assert_eq!(c.to_string(), "fast <= 20");
        assert_eq!(
            c.is_satisfied(&ParameterSet::new().with("fast", 20)),
            Some(true)
        );
        assert_eq!(c.is_satisfied(&ParameterSet::new()), None);
        assert!(Constraint::parse("fast slow").is_err());
    }

    #[test]
    fn fn_template_delegates_to_closure() {
        let template = FnTemplate::new("Threshold", ["level"], |params| {
            let level = params
                .get("level")
                .and_then(ParameterValue::as_f64)
                .ok_or_else(|| FxtraderError::invalid_parameter("level", "must be numeric"))?;
            Strategy::builder(format!("Threshold {params}"))
                .long(
                    Rule::Custom(CustomRule::new("above", move |w| w.current().close > level)),
                    Rule::Custom(CustomRule::new("below", move |w| w.current().close < level)),
                )
                .build()
        });
        assert_eq!(template.parameters(), ["level"]);
        assert!(template.instantiate(&ParameterSet::new().with("level", 1.5)).is_ok());
        assert!(template.instantiate(&ParameterSet::new().with("level", "x")).is_err());
    }
}
