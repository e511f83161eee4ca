//! Parameter values and concrete parameter assignments.

use serde::Serialize;
use std::fmt;

/// A single parameter value: numeric or an enumerated choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Choice(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Choice(_) => None,
        }
    }

    /// Integral, non-negative value. Floats qualify only when they have no
    /// fractional part.
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParameterValue::Int(v) if *v >= 0 => Some(*v as usize),
            ParameterValue::Float(v) if v.is_finite() && *v >= 0.0 && v.fract() == 0.0 => {
                Some(*v as usize)
            }
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&str> {
        match self {
            ParameterValue::Choice(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a literal: integers first, then floats, otherwise a choice.
    pub fn parse_literal(raw: &str) -> ParameterValue {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<i64>() {
            ParameterValue::Int(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            ParameterValue::Float(v)
        } else {
            ParameterValue::Choice(raw.to_string())
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Choice(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<usize> for ParameterValue {
    fn from(v: usize) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Choice(v.to_string())
    }
}

/// One concrete assignment of values to a strategy's parameter dimensions.
///
/// Entries keep the order in which they were inserted, which is the order of
/// the dimensions in the parameter domain they were enumerated from.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParameterSet {
    entries: Vec<(String, ParameterValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Replaces an existing value with the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
