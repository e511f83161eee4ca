//! Rule DSL parser.
//!
//! Recursive descent parser for the rule grammar. Converts text to AST with
//! meaningful error messages including character offset, expected/found tokens.
//!
//! Numbers in a rule may be written as `$name` placeholders, resolved from a
//! `ParameterSet` when a strategy template is instantiated. Indicator
//! arguments are checked for shape here (arity, value kinds); their numeric
//! domains are validated when the strategy is built.

use crate::domain::error::ParseError;
use crate::domain::indicator::{parameter_names, IndicatorSpec};
use crate::domain::parameter::{ParameterSet, ParameterValue};
use crate::domain::rule::{IndicatorField, IndicatorRef, Operand, Rule};

/// How `$name` placeholders are resolved.
#[derive(Clone, Copy)]
enum Bindings<'p> {
    /// Placeholders are an error.
    Forbidden,
    Params(&'p ParameterSet),
    /// Placeholders are recorded and stand-in values used, to check syntax
    /// before any values are known.
    Collect,
}

struct Parser<'a, 'p> {
    input: &'a str,
    pos: usize,
    bindings: Bindings<'p>,
    placeholders: Vec<String>,
}

/// Map a DSL indicator identifier to its base name and field.
fn indicator_identifier(word: &str) -> Option<(&'static str, IndicatorField)> {
    let found = match word {
        "SMA" => ("SMA", IndicatorField::Value),
        "EMA" => ("EMA", IndicatorField::Value),
        "WMA" => ("WMA", IndicatorField::Value),
        "RSI" => ("RSI", IndicatorField::Value),
        "ROC" => ("ROC", IndicatorField::Value),
        "MOMENTUM" => ("MOMENTUM", IndicatorField::Value),
        "ATR" => ("ATR", IndicatorField::Value),
        "ADX" => ("ADX", IndicatorField::Value),
        "STDDEV" => ("STDDEV", IndicatorField::Value),
        "MACD_LINE" => ("MACD", IndicatorField::MacdLine),
        "MACD_SIGNAL" => ("MACD", IndicatorField::MacdSignal),
        "MACD_HISTOGRAM" => ("MACD", IndicatorField::MacdHistogram),
        "STOCHASTIC_K" => ("STOCHASTIC", IndicatorField::StochasticK),
        "STOCHASTIC_D" => ("STOCHASTIC", IndicatorField::StochasticD),
        "BOLLINGER_UPPER" => ("BOLLINGER", IndicatorField::BollingerUpper),
        "BOLLINGER_MIDDLE" => ("BOLLINGER", IndicatorField::BollingerMiddle),
        "BOLLINGER_LOWER" => ("BOLLINGER", IndicatorField::BollingerLower),
        "ICHIMOKU_TENKAN" => ("ICHIMOKU", IndicatorField::IchimokuTenkan),
        "ICHIMOKU_KIJUN" => ("ICHIMOKU", IndicatorField::IchimokuKijun),
        "ICHIMOKU_SENKOU_A" => ("ICHIMOKU", IndicatorField::IchimokuSenkouA),
        "ICHIMOKU_SENKOU_B" => ("ICHIMOKU", IndicatorField::IchimokuSenkouB),
        _ => return None,
    };
    Some(found)
}

impl<'a, 'p> Parser<'a, 'p> {
    fn new(input: &'a str, bindings: Bindings<'p>) -> Self {
        Self {
            input,
            pos: 0,
            bindings,
            placeholders: Vec::new(),
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(
                format!("expected '{}', found '{}'", expected, ch),
                self.pos,
            )),
            None => Err(self.error(
                format!("expected '{}', found end of input", expected),
                self.pos,
            )),
        }
    }

    fn peek_word(&self) -> &'a str {
        let rest = self.remaining();
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        &rest[..end]
    }

    fn found(&self) -> String {
        let word = self.peek_word();
        if !word.is_empty() {
            word.to_string()
        } else {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        }
    }

    fn take_word(&mut self) -> &'a str {
        let word = self.peek_word();
        self.pos += word.len();
        word
    }

    fn scan_number(&mut self) -> Result<&'a str, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(self.error("expected number", start));
        }
        Ok(&self.input[start..self.pos])
    }

    /// `$name` → bound value, or `None` while probing.
    fn parse_placeholder(&mut self) -> Result<Option<ParameterValue>, ParseError> {
        let start = self.pos;
        self.expect_char('$')?;
        let name = self.take_word().to_ascii_lowercase();
        if name.is_empty() {
            return Err(self.error("expected parameter name after '$'", start));
        }
        if !self.placeholders.contains(&name) {
            self.placeholders.push(name.clone());
        }
        match self.bindings {
            Bindings::Forbidden => Err(self.error(
                format!("unbound parameter '${}'", name),
                start,
            )),
            Bindings::Params(params) => params.get(&name).cloned().map(Some).ok_or_else(|| {
                self.error(format!("no value bound for parameter '${}'", name), start)
            }),
            Bindings::Collect => Ok(None),
        }
    }

    fn is_number_start(&self) -> bool {
        self.peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
    }

    /// Number literal or numeric placeholder.
    fn parse_scalar(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some('$') {
            return match self.parse_placeholder()? {
                None => Ok(0.0),
                Some(value) => value.as_f64().ok_or_else(|| {
                    self.error(format!("expected a number, got '{}'", value), start)
                }),
            };
        }
        let raw = self.scan_number()?;
        raw.parse::<f64>()
            .map_err(|_| self.error(format!("invalid number: {}", raw), start))
    }

    /// Look-back count: a positive integer literal or placeholder.
    fn parse_count(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let value = if self.peek() == Some('$') {
            match self.parse_placeholder()? {
                None => return Ok(1),
                Some(value) => value,
            }
        } else {
            ParameterValue::parse_literal(self.scan_number()?)
        };
        match value.as_usize() {
            Some(0) => Err(self.error("count must be at least 1", start)),
            Some(n) => Ok(n),
            None => Err(self.error(
                format!("expected a positive integer, got '{}'", value),
                start,
            )),
        }
    }

    fn parse_indicator(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let word = self.peek_word();
        let Some((base, field)) = indicator_identifier(word) else {
            return Err(self.error(format!("expected indicator, found '{}'", self.found()), start));
        };
        self.pos += word.len();
        self.expect_char('(')?;

        let mut args: Vec<Option<ParameterValue>> = Vec::new();
        loop {
            self.skip_whitespace();
            let arg = if self.peek() == Some('$') {
                self.parse_placeholder()?
            } else if self.is_number_start() {
                Some(ParameterValue::parse_literal(self.scan_number()?))
            } else {
                let arg_start = self.pos;
                let w = self.take_word();
                if w.is_empty() {
                    return Err(self.error(
                        format!("expected indicator argument, found '{}'", self.found()),
                        arg_start,
                    ));
                }
                Some(ParameterValue::Choice(w.to_string()))
            };
            args.push(arg);

            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
        }

        let names = parameter_names(base).unwrap_or(&[]);
        let args = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| {
                arg.unwrap_or_else(|| match names.get(i) {
                    Some(&"source") => ParameterValue::Choice("close".to_string()),
                    _ => ParameterValue::Int(2),
                })
            })
            .collect();

        let indicator_type = IndicatorSpec::from_positional(base, args)
            .and_then(|spec| spec.shape())
            .map_err(|e| self.error(e.to_string(), start))?;

        Ok(Operand::Indicator(IndicatorRef {
            indicator_type,
            field,
        }))
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self.is_number_start() || self.peek() == Some('$') {
            return Ok(Operand::Constant(self.parse_scalar()?));
        }

        match self.peek_word() {
            "open" => {
                self.pos += 4;
                Ok(Operand::Open)
            }
            "high" => {
                self.pos += 4;
                Ok(Operand::High)
            }
            "low" => {
                self.pos += 3;
                Ok(Operand::Low)
            }
            "close" => {
                self.pos += 5;
                Ok(Operand::Close)
            }
            "volume" => {
                self.pos += 6;
                Ok(Operand::Volume)
            }
            _ => self.parse_indicator(),
        }
    }

    fn parse_rule_list(&mut self, keyword: &str) -> Result<Vec<Rule>, ParseError> {
        let mut rules = vec![self.parse_rule()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            rules.push(self.parse_rule()?);
        }
        if rules.len() < 2 {
            return Err(self.error(format!("{} requires at least 2 rules", keyword), self.pos));
        }
        Ok(rules)
    }

    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let keyword = self.peek_word();

        let rule = match keyword {
            "CROSS_ABOVE" | "CROSS_BELOW" | "ABOVE" | "BELOW" | "EQUALS" => {
                self.pos += keyword.len();
                self.expect_char('(')?;
                let left = self.parse_operand()?;
                self.expect_char(',')?;
                let right = self.parse_operand()?;
                self.expect_char(')')?;
                match keyword {
                    "CROSS_ABOVE" => Rule::CrossAbove { left, right },
                    "CROSS_BELOW" => Rule::CrossBelow { left, right },
                    "ABOVE" => Rule::Above { left, right },
                    "BELOW" => Rule::Below { left, right },
                    _ => Rule::Equals { left, right },
                }
            }
            "BETWEEN" => {
                self.pos += keyword.len();
                self.expect_char('(')?;
                let operand = self.parse_operand()?;
                self.expect_char(',')?;
                let lower = self.parse_scalar()?;
                self.expect_char(',')?;
                let upper = self.parse_scalar()?;
                self.expect_char(')')?;
                Rule::Between {
                    operand,
                    lower,
                    upper,
                }
            }
            "BREAKOUT_UPPER" | "BREAKOUT_LOWER" => {
                self.pos += keyword.len();
                self.expect_char('(')?;
                let operand = self.parse_operand()?;
                self.expect_char(',')?;
                let upper = self.parse_operand()?;
                self.expect_char(',')?;
                let lower = self.parse_operand()?;
                self.expect_char(')')?;
                if keyword == "BREAKOUT_UPPER" {
                    Rule::BreakoutUpper {
                        operand,
                        upper,
                        lower,
                    }
                } else {
                    Rule::BreakoutLower {
                        operand,
                        upper,
                        lower,
                    }
                }
            }
            "AND" | "OR" => {
                self.pos += keyword.len();
                self.expect_char('(')?;
                let rules = self.parse_rule_list(keyword)?;
                if keyword == "AND" {
                    Rule::And(rules)
                } else {
                    Rule::Or(rules)
                }
            }
            "NOT" => {
                self.pos += keyword.len();
                self.expect_char('(')?;
                let rule = self.parse_rule()?;
                self.expect_char(')')?;
                Rule::Not(Box::new(rule))
            }
            "CONSECUTIVE" | "ANY_OF" => {
                self.pos += keyword.len();
                self.expect_char('(')?;
                let rule = Box::new(self.parse_rule()?);
                self.expect_char(',')?;
                let count = self.parse_count()?;
                self.expect_char(')')?;
                if keyword == "CONSECUTIVE" {
                    Rule::Consecutive { rule, count }
                } else {
                    Rule::AnyOf { rule, count }
                }
            }
            "HELD_FOR" => {
                self.pos += keyword.len();
                self.expect_char('(')?;
                let bars = self.parse_count()?;
                self.expect_char(')')?;
                Rule::HeldFor(bars)
            }
            _ => {
                return Err(self.error(format!("expected rule, found '{}'", self.found()), start));
            }
        };
        Ok(rule)
    }

    fn parse(&mut self) -> Result<Rule, ParseError> {
        let rule = self.parse_rule()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(
                format!("unexpected input after rule: '{}'", self.remaining()),
                self.pos,
            ));
        }
        Ok(rule)
    }
}

/// Parse a rule without placeholders.
pub fn parse(input: &str) -> Result<Rule, ParseError> {
    Parser::new(input, Bindings::Forbidden).parse()
}

/// Parse a rule, substituting `$name` placeholders from `params`.
pub fn parse_with_params(input: &str, params: &ParameterSet) -> Result<Rule, ParseError> {
    Parser::new(input, Bindings::Params(params)).parse()
}

/// Check the syntax of a rule template and list its placeholders in
/// first-use order.
pub fn placeholders(input: &str) -> Result<Vec<String>, ParseError> {
    let mut parser = Parser::new(input, Bindings::Collect);
    parser.parse()?;
    Ok(parser.placeholders)
}
