//! Parameter domains: named dimensions of candidate values.

use serde::Serialize;

use crate::domain::error::FxtraderError;
use crate::domain::parameter::{ParameterSet, ParameterValue};

/// Slack for float accumulation when deciding whether the last step of a
/// range still lands on or below `end`.
const RANGE_EPSILON: f64 = 1e-9;

/// Upper bound on the values one range dimension may enumerate.
pub const MAX_RANGE_POINTS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DimensionValues {
    /// Explicit candidate values, numeric or choice.
    Grid(Vec<ParameterValue>),
    /// `start, start + step, ...` up to and including `end`.
    Range { start: f64, end: f64, step: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimension {
    pub name: String,
    pub values: DimensionValues,
}

impl Dimension {
    pub fn grid<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>,
    {
        Dimension {
            name: name.into(),
            values: DimensionValues::Grid(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn range(name: impl Into<String>, start: f64, end: f64, step: f64) -> Self {
        Dimension {
            name: name.into(),
            values: DimensionValues::Range { start, end, step },
        }
    }

    /// Parse `start..end step s` (step defaults to 1) or a comma-separated
    /// list of literals.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, String> {
        let name = name.into();
        let text = text.trim();
        if let Some((start, rest)) = text.split_once("..") {
            let (end, step) = match rest.split_once("step") {
                Some((end, step)) => (end, Some(step)),
                None => (rest, None),
            };
            let number = |raw: &str, what: &str| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("invalid range {what} '{}'", raw.trim()))
            };
            let step = match step {
                Some(raw) => number(raw, "step")?,
                None => 1.0,
            };
            return Ok(Dimension::range(name, number(start, "start")?, number(end, "end")?, step));
        }
        let values: Vec<ParameterValue> = text
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ParameterValue::parse_literal)
            .collect();
        if values.is_empty() {
            return Err("expected a value list or a range 'start..end step s'".to_string());
        }
        Ok(Dimension {
            name,
            values: DimensionValues::Grid(values),
        })
    }

    /// Enumerate the dimension's values. Integral ranges yield `Int` values.
    /// A range whose step exceeds its span yields nothing.
    pub fn enumerate(&self) -> Result<Vec<ParameterValue>, FxtraderError> {
        match &self.values {
            DimensionValues::Grid(values) => Ok(values.clone()),
            DimensionValues::Range { start, end, step } => {
                let (start, end, step) = (*start, *end, *step);
                if !start.is_finite() || !end.is_finite() {
                    return Err(FxtraderError::invalid_parameter(
                        &self.name,
                        format!("range bounds must be finite, got {start}..{end}"),
                    ));
                }
                if !step.is_finite() || step <= 0.0 {
                    return Err(FxtraderError::invalid_parameter(
                        &self.name,
                        format!("range step must be a positive number, got {step}"),
                    ));
                }
                let span = end - start;
                if span < step * (1.0 - RANGE_EPSILON) {
                    return Ok(Vec::new());
                }
                let steps = (span / step + RANGE_EPSILON).floor();
                if steps >= MAX_RANGE_POINTS as f64 {
                    return Err(FxtraderError::invalid_parameter(
                        &self.name,
                        format!("range {start}..{end} step {step} is too large to enumerate"),
                    ));
                }
                let count = steps as usize + 1;
                let integral = start.fract() == 0.0 && step.fract() == 0.0;
                Ok((0..count)
                    .map(|k| {
                        let v = start + k as f64 * step;
                        if integral {
                            ParameterValue::Int(v as i64)
                        } else {
                            ParameterValue::Float((v * 1e12).round() / 1e12)
                        }
                    })
                    .collect())
            }
        }
    }
}

/// Ordered dimensions. The first dimension varies slowest in enumeration.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParameterDomain {
    dimensions: Vec<Dimension>,
}

/// One enumerated dimension: its name and candidate values.
pub type Axis = (String, Vec<ParameterValue>);

impl ParameterDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn push(&mut self, dimension: Dimension) {
        self.dimensions.push(dimension);
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.name.as_str())
    }

    /// Validate and enumerate every dimension.
    pub fn axes(&self) -> Result<Vec<Axis>, FxtraderError> {
        if self.dimensions.is_empty() {
            return Err(FxtraderError::EmptyDomain {
                reason: "parameter domain has no dimensions".into(),
            });
        }
        let mut axes: Vec<Axis> = Vec::with_capacity(self.dimensions.len());
        for dim in &self.dimensions {
            if dim.name.trim().is_empty() {
                return Err(FxtraderError::invalid_parameter(
                    "dimension",
                    "name must not be empty",
                ));
            }
            let name = dim.name.to_ascii_lowercase();
            if axes.iter().any(|(n, _)| *n == name) {
                return Err(FxtraderError::invalid_parameter(
                    name,
                    "dimension declared more than once",
                ));
            }
            axes.push((name, dim.enumerate()?));
        }
        Ok(axes)
    }
}

/// Number of points in the Cartesian product of `axes`.
pub(crate) fn grid_size(axes: &[Axis]) -> Result<usize, FxtraderError> {
    axes.iter().try_fold(1usize, |acc, (_, values)| {
        acc.checked_mul(values.len()).ok_or_else(|| {
            FxtraderError::invalid_parameter("domain", "too many candidates to enumerate")
        })
    })
}

/// Decode a flat grid index, first axis slowest.
pub(crate) fn grid_point(axes: &[Axis], mut flat: usize) -> ParameterSet {
    let mut picks = vec![0usize; axes.len()];
    for (slot, (_, values)) in picks.iter_mut().zip(axes).rev() {
        *slot = flat % values.len();
        flat /= values.len();
    }
    axes.iter()
        .zip(picks)
        .fold(ParameterSet::new(), |set, ((name, values), pick)| {
            set.with(name.clone(), values[pick].clone())
        })
}
