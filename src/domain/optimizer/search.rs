//! Candidate enumeration strategies.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::parameter_space::{grid_point, grid_size, ParameterDomain};
use crate::domain::error::FxtraderError;
use crate::domain::parameter::ParameterSet;

/// Turns a parameter domain into an ordered candidate list. The order is the
/// enumeration order used for tie-breaking, so it must be deterministic.
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn candidates(&self, domain: &ParameterDomain) -> Result<Vec<ParameterSet>, FxtraderError>;
}

/// Most candidates a full grid search will materialize.
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Full Cartesian product, first dimension varying slowest.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

impl SearchStrategy for GridSearch {
    fn name(&self) -> &str {
        "grid"
    }

    fn candidates(&self, domain: &ParameterDomain) -> Result<Vec<ParameterSet>, FxtraderError> {
        let axes = domain.axes()?;
        let size = grid_size(&axes)?;
        if size > MAX_GRID_POINTS {
            return Err(FxtraderError::invalid_parameter(
                "domain",
                format!("grid of {size} candidates exceeds {MAX_GRID_POINTS}; use random search"),
            ));
        }
        Ok((0..size).map(|i| grid_point(&axes, i)).collect())
    }
}

/// `samples` distinct grid points drawn with a seeded RNG. Returns the whole
/// grid when it has no more than `samples` points.
#[derive(Debug, Clone, Copy)]
pub struct RandomSearch {
    pub samples: usize,
    pub seed: u64,
}

impl SearchStrategy for RandomSearch {
    fn name(&self) -> &str {
        "random"
    }

    fn candidates(&self, domain: &ParameterDomain) -> Result<Vec<ParameterSet>, FxtraderError> {
        if self.samples == 0 {
            return Err(FxtraderError::invalid_parameter(
                "samples",
                "must be at least 1",
            ));
        }
        let axes = domain.axes()?;
        let size = grid_size(&axes)?;
        if size <= self.samples {
            return Ok((0..size).map(|i| grid_point(&axes, i)).collect());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut picks = rand::seq::index::sample(&mut rng, size, self.samples).into_vec();
        picks.sort_unstable();
        Ok(picks.into_iter().map(|i| grid_point(&axes, i)).collect())
    }
}
