//! Parameter optimization.
//!
//! Every candidate runs the same pipeline as a single backtest: instantiate
//! the template, generate signals, simulate, compute metrics. Candidates are
//! independent, so they are evaluated on a rayon pool and collected back in
//! enumeration order. Ranking only ever sees that order, which keeps results
//! identical whatever the worker count.

pub mod parameter_space;
pub mod search;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::backtest::{simulate, BacktestConfig};
use crate::domain::error::FxtraderError;
use crate::domain::metrics::{Metrics, MetricsOptions, RankBy};
use crate::domain::parameter::ParameterSet;
use crate::domain::strategy::Strategy;
use crate::domain::template::StrategyTemplate;
use crate::domain::timeseries::Timeseries;

pub use parameter_space::{Dimension, DimensionValues, ParameterDomain, MAX_RANGE_POINTS};
pub use search::{GridSearch, RandomSearch, SearchStrategy, MAX_GRID_POINTS};

pub const DEFAULT_TOP_N: usize = 5;

/// Cooperative stop flag shared between the caller and the workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Descending,
    Ascending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Descending => f.write_str("descending"),
            SortOrder::Ascending => f.write_str("ascending"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => Ok(SortOrder::Descending),
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            other => Err(format!("unknown sort order '{other}', expected ascending or descending")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub rank_by: RankBy,
    pub order: SortOrder,
    pub top_n: usize,
    /// 0 = rayon's global pool, 1 = sequential, n = dedicated pool of n threads.
    pub workers: usize,
    pub backtest: BacktestConfig,
    pub metrics: MetricsOptions,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            rank_by: RankBy::default(),
            order: SortOrder::default(),
            top_n: DEFAULT_TOP_N,
            workers: 0,
            backtest: BacktestConfig::default(),
            metrics: MetricsOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Evaluated { metrics: Metrics },
    Failed { error: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    /// Position in enumeration order.
    pub index: usize,
    pub parameters: ParameterSet,
    pub outcome: CandidateOutcome,
}

impl CandidateResult {
    pub fn metrics(&self) -> Option<&Metrics> {
        match &self.outcome {
            CandidateOutcome::Evaluated { metrics } => Some(metrics),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    /// 1-based.
    pub rank: usize,
    pub index: usize,
    pub parameters: ParameterSet,
    pub score: f64,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub template: String,
    pub instrument: String,
    pub search: String,
    pub rank_by: RankBy,
    pub order: SortOrder,
    pub best: Vec<RankedCandidate>,
    /// Every candidate in enumeration order, for audit.
    pub candidates: Vec<CandidateResult>,
    pub cancelled: bool,
}

impl OptimizationResult {
    pub fn best(&self) -> Option<&RankedCandidate> {
        self.best.first()
    }

    pub fn evaluated(&self) -> usize {
        self.count(|o| matches!(o, CandidateOutcome::Evaluated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CandidateOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CandidateOutcome::Cancelled))
    }

    fn count(&self, pred: impl Fn(&CandidateOutcome) -> bool) -> usize {
        self.candidates.iter().filter(|c| pred(&c.outcome)).count()
    }
}

pub struct Optimizer<'a> {
    series: &'a Timeseries,
    config: OptimizerConfig,
    search: Box<dyn SearchStrategy>,
}

impl<'a> Optimizer<'a> {
    pub fn new(series: &'a Timeseries, config: OptimizerConfig) -> Result<Self, FxtraderError> {
        config.backtest.validate()?;
        if config.top_n == 0 {
            return Err(FxtraderError::invalid_parameter("top_n", "must be at least 1"));
        }
        Ok(Optimizer {
            series,
            config,
            search: Box::new(GridSearch),
        })
    }

    pub fn with_search(mut self, search: impl SearchStrategy + 'static) -> Self {
        self.search = Box::new(search);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn optimize(
        &self,
        template: &dyn StrategyTemplate,
        domain: &ParameterDomain,
    ) -> Result<OptimizationResult, FxtraderError> {
        self.optimize_with_cancel(template, domain, &CancellationToken::new())
    }

    pub fn optimize_with_cancel(
        &self,
        template: &dyn StrategyTemplate,
        domain: &ParameterDomain,
        cancel: &CancellationToken,
    ) -> Result<OptimizationResult, FxtraderError> {
        let candidates = self.search.candidates(domain)?;
        check_template_parameters(template, domain)?;
        if candidates.is_empty() {
            return Err(FxtraderError::EmptyDomain {
                reason: "parameter domain enumerates no candidates".into(),
            });
        }

        let strategies: Vec<Result<Strategy, FxtraderError>> = candidates
            .iter()
            .map(|params| template.instantiate(params))
            .collect();

        let max_warmup = strategies
            .iter()
            .flatten()
            .map(Strategy::warmup)
            .max()
            .unwrap_or(0);
        if self.series.len() <= max_warmup {
            return Err(FxtraderError::InsufficientData {
                bars: self.series.len(),
                required: max_warmup + 1,
            });
        }

        info!(
            template = template.name(),
            instrument = self.series.instrument(),
            search = self.search.name(),
            candidates = candidates.len(),
            workers = self.config.workers,
            "optimization started"
        );

        let evaluate = |index: usize| -> CandidateOutcome {
            self.evaluate(index, &candidates[index], &strategies[index], cancel)
        };
        let outcomes: Vec<CandidateOutcome> = match self.config.workers {
            1 => (0..candidates.len()).map(evaluate).collect(),
            0 => (0..candidates.len()).into_par_iter().map(evaluate).collect(),
            n => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| FxtraderError::WorkerPool {
                        reason: e.to_string(),
                    })?;
                pool.install(|| (0..candidates.len()).into_par_iter().map(evaluate).collect())
            }
        };

        let results: Vec<CandidateResult> = candidates
            .into_iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (parameters, outcome))| CandidateResult {
                index,
                parameters,
                outcome,
            })
            .collect();

        let best = rank(&results, self.config.rank_by, self.config.order, self.config.top_n);
        let result = OptimizationResult {
            template: template.name().to_string(),
            instrument: self.series.instrument().to_string(),
            search: self.search.name().to_string(),
            rank_by: self.config.rank_by,
            order: self.config.order,
            best,
            cancelled: results
                .iter()
                .any(|c| c.outcome == CandidateOutcome::Cancelled),
            candidates: results,
        };

        info!(
            evaluated = result.evaluated(),
            failed = result.failed(),
            skipped = result.skipped(),
            cancelled = result.cancelled,
            best = result.best().map(|b| b.score),
            "optimization complete"
        );
        Ok(result)
    }

    fn evaluate(
        &self,
        index: usize,
        params: &ParameterSet,
        strategy: &Result<Strategy, FxtraderError>,
        cancel: &CancellationToken,
    ) -> CandidateOutcome {
        if cancel.is_cancelled() {
            return CandidateOutcome::Cancelled;
        }
        let strategy = match strategy {
            Ok(s) => s,
            Err(e) => {
                warn!(index, %params, error = %e, "candidate rejected");
                return CandidateOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };
        match simulate(self.series, strategy, &self.config.backtest, &self.config.metrics) {
            Ok(run) => {
                debug!(
                    index,
                    %params,
                    trades = run.metrics.total_trades,
                    total_return = run.metrics.total_return,
                    "candidate evaluated"
                );
                CandidateOutcome::Evaluated {
                    metrics: run.metrics,
                }
            }
            Err(e) => {
                warn!(index, %params, error = %e, "candidate failed");
                CandidateOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Optimize with the default configuration and grid search.
pub fn optimize(
    series: &Timeseries,
    template: &dyn StrategyTemplate,
    domain: &ParameterDomain,
) -> Result<OptimizationResult, FxtraderError> {
    Optimizer::new(series, OptimizerConfig::default())?.optimize(template, domain)
}

/// The domain must cover exactly the template's declared parameters.
fn check_template_parameters(
    template: &dyn StrategyTemplate,
    domain: &ParameterDomain,
) -> Result<(), FxtraderError> {
    let names: Vec<String> = domain.names().map(str::to_ascii_lowercase).collect();
    if let Some(missing) = template.parameters().iter().find(|p| !names.contains(p)) {
        return Err(FxtraderError::invalid_parameter(
            missing.as_str(),
            format!("template '{}' parameter has no dimension in the domain", template.name()),
        ));
    }
    if let Some(extra) = names
        .iter()
        .find(|n| !template.parameters().contains(n))
    {
        return Err(FxtraderError::invalid_parameter(
            extra.as_str(),
            format!("not a parameter of template '{}'", template.name()),
        ));
    }
    Ok(())
}

/// Order evaluated candidates: by score in `order`, NaN last, then fewer
/// trades, then enumeration order.
pub fn rank(
    results: &[CandidateResult],
    rank_by: RankBy,
    order: SortOrder,
    top_n: usize,
) -> Vec<RankedCandidate> {
    let mut scored: Vec<(&CandidateResult, &Metrics, f64)> = results
        .iter()
        .filter_map(|c| c.metrics().map(|m| (c, m, m.get(rank_by))))
        .collect();

    scored.sort_by(|(ca, ma, a), (cb, mb, b)| {
        let by_score = match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = a.partial_cmp(b).unwrap_or(Ordering::Equal);
                match order {
                    SortOrder::Descending => ord.reverse(),
                    SortOrder::Ascending => ord,
                }
            }
        };
        by_score
            .then(ma.total_trades.cmp(&mb.total_trades))
            .then(ca.index.cmp(&cb.index))
    });

    scored
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (candidate, metrics, score))| RankedCandidate {
            rank: i + 1,
            index: candidate.index,
            parameters: candidate.parameters.clone(),
            score,
            metrics: metrics.clone(),
        })
        .collect()
}
