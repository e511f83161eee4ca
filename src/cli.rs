//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_result_adapter::JsonResultAdapter;
use crate::domain::backtest::{
    self as backtest_engine, BacktestConfig, BacktestResult, PositionSizing,
};
use crate::domain::config_validation::{
    parse_bound, validate_backtest_config, validate_data_config, validate_optimize_config,
    validate_strategy_config,
};
use crate::domain::error::FxtraderError;
use crate::domain::metrics::{MetricsOptions, RankBy};
use crate::domain::optimizer::{
    Dimension, GridSearch, OptimizationResult, Optimizer, OptimizerConfig, ParameterDomain,
    RandomSearch, SearchStrategy, SortOrder, DEFAULT_TOP_N,
};
use crate::domain::parameter::{ParameterSet, ParameterValue};
use crate::domain::rule_parser;
use crate::domain::template::{RuleTemplate, StrategyTemplate};
use crate::domain::timeseries::Timeseries;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::result_port::ResultPort;

const RULE_KEYS: [&str; 4] = ["entry_long", "exit_long", "entry_short", "exit_short"];

#[derive(Parser, Debug)]
#[command(name = "fxtrader", about = "FX/CFD strategy backtester and optimizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        instrument: Option<String>,
        /// Directory for the JSON result
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Bind a strategy placeholder, e.g. -p fast=10
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, ParameterValue)>,
    },
    /// Search the [parameters] domain for the best strategy parameters
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        instrument: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// 0 = all cores, 1 = sequential
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        rank_by: Option<RankBy>,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Show data range for instrument(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        instrument: Option<String>,
    },
}

fn parse_param(raw: &str) -> Result<(String, ParameterValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim().trim_start_matches('$').to_ascii_lowercase();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    Ok((name, ParameterValue::parse_literal(value)))
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            instrument,
            output,
            params,
        } => run_backtest(&config, instrument.as_deref(), output.as_deref(), params),
        Command::Optimize {
            config,
            instrument,
            output,
            workers,
            rank_by,
            top,
        } => run_optimize(
            &config,
            instrument.as_deref(),
            output.as_deref(),
            OptimizeOverrides {
                workers,
                rank_by,
                top,
            },
        ),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Info { config, instrument } => run_info(&config, instrument.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, FxtraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> BacktestConfig {
    let defaults = BacktestConfig::default();
    BacktestConfig {
        spread: config.get_double("backtest", "spread", defaults.spread),
        commission_per_trade: config.get_double(
            "backtest",
            "commission_per_trade",
            defaults.commission_per_trade,
        ),
        commission_pct: config.get_double("backtest", "commission_pct", defaults.commission_pct),
        position_size: config.get_double("backtest", "position_size", defaults.position_size),
        sizing: build_position_sizing(config),
    }
}

/// `[backtest] sizing = risk` sizes from `account` and `risk_pct`; anything else is fixed.
fn build_position_sizing(config: &dyn ConfigPort) -> PositionSizing {
    match config.get_string("backtest", "sizing") {
        Some(raw) if raw.trim().eq_ignore_ascii_case("risk") => PositionSizing::Risk {
            account: config.get_double("backtest", "account", 10_000.0),
            risk_pct: config.get_double("backtest", "risk_pct", 1.0),
        },
        _ => PositionSizing::Fixed,
    }
}

pub fn build_metrics_options(config: &dyn ConfigPort) -> MetricsOptions {
    MetricsOptions {
        exclude_forced_close: config.get_bool("backtest", "exclude_forced_close", false),
    }
}

fn strategy_text(config: &dyn ConfigPort, key: &str) -> Option<String> {
    config
        .get_string("strategy", key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Build the `[strategy]` section as a template; `[constraints]` values apply
/// to its placeholders.
pub fn build_template(config: &dyn ConfigPort) -> Result<RuleTemplate, FxtraderError> {
    let name = strategy_text(config, "name").unwrap_or_else(|| "Unnamed".to_string());
    let mut builder = RuleTemplate::builder(name);

    if let (Some(entry), Some(exit)) = (
        strategy_text(config, "entry_long"),
        strategy_text(config, "exit_long"),
    ) {
        builder = builder.long(entry, exit);
    }
    if let (Some(entry), Some(exit)) = (
        strategy_text(config, "entry_short"),
        strategy_text(config, "exit_short"),
    ) {
        builder = builder.short(entry, exit);
    }
    if let Some(stop) = strategy_text(config, "stop_loss") {
        builder = builder.stop_loss(stop);
    }
    for key in config.keys("constraints") {
        if let Some(text) = config.get_string("constraints", &key) {
            builder = builder.constraint(text);
        }
    }
    builder.build()
}

pub fn build_domain(config: &dyn ConfigPort) -> Result<ParameterDomain, FxtraderError> {
    let mut domain = ParameterDomain::new();
    for key in config.keys("parameters") {
        let raw = config.get_string("parameters", &key).unwrap_or_default();
        let dim = Dimension::parse(key.as_str(), &raw).map_err(|reason| {
            FxtraderError::ConfigInvalid {
                section: "parameters".into(),
                key: key.clone(),
                reason,
            }
        })?;
        domain.push(dim);
    }
    Ok(domain)
}

#[derive(Debug, Default)]
pub struct OptimizeOverrides {
    pub workers: Option<usize>,
    pub rank_by: Option<RankBy>,
    pub top: Option<usize>,
}

pub fn build_optimizer_config(
    config: &dyn ConfigPort,
    overrides: &OptimizeOverrides,
) -> Result<OptimizerConfig, FxtraderError> {
    let invalid = |key: &str, reason: String| FxtraderError::ConfigInvalid {
        section: "optimize".into(),
        key: key.into(),
        reason,
    };
    let rank_by = match overrides.rank_by {
        Some(r) => r,
        None => match config.get_string("optimize", "rank_by") {
            Some(raw) => raw.parse().map_err(|e| invalid("rank_by", e))?,
            None => RankBy::default(),
        },
    };
    let order = match config.get_string("optimize", "order") {
        Some(raw) => raw.parse::<SortOrder>().map_err(|e| invalid("order", e))?,
        None => SortOrder::default(),
    };
    let top_n = overrides.top.unwrap_or_else(|| {
        config
            .get_int("optimize", "top_n", DEFAULT_TOP_N as i64)
            .max(0) as usize
    });
    let workers = overrides
        .workers
        .unwrap_or_else(|| config.get_int("optimize", "workers", 0).max(0) as usize);

    Ok(OptimizerConfig {
        rank_by,
        order,
        top_n,
        workers,
        backtest: build_backtest_config(config),
        metrics: build_metrics_options(config),
    })
}

fn resolve_instrument(
    instrument: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, FxtraderError> {
    instrument
        .map(str::to_string)
        .or_else(|| config.get_string("data", "instrument"))
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FxtraderError::ConfigMissing {
            section: "data".into(),
            key: "instrument".into(),
        })
}

fn data_adapter(config: &dyn ConfigPort) -> CsvAdapter {
    let dir = config
        .get_string("data", "directory")
        .unwrap_or_else(|| "data".to_string());
    CsvAdapter::new(PathBuf::from(dir))
}

fn result_adapter(output: Option<&Path>, config: &dyn ConfigPort) -> JsonResultAdapter {
    let dir = output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("output", "directory").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("results"));
    JsonResultAdapter::new(dir)
}

fn load_series(
    data: &dyn DataPort,
    config: &dyn ConfigPort,
    instrument: Option<&str>,
) -> Result<Timeseries, FxtraderError> {
    let instrument = resolve_instrument(instrument, config)?;
    let bound = |key: &str| config.get_string("data", key).as_deref().and_then(parse_bound);
    let series = data.load_between(&instrument, bound("start"), bound("end"))?;
    eprintln!(
        "Loaded {}: {} bars{}",
        instrument,
        series.len(),
        match (series.first_timestamp(), series.last_timestamp()) {
            (Some(first), Some(last)) => format!(", {} to {}", first, last),
            _ => String::new(),
        }
    );
    Ok(series)
}

pub fn run_backtest(
    config_path: &Path,
    instrument: Option<&str>,
    output: Option<&Path>,
    params: Vec<(String, ParameterValue)>,
) -> Result<(), FxtraderError> {
    let config = load_config(config_path)?;
    let path = run_backtest_pipeline(
        &data_adapter(&config),
        &result_adapter(output, &config),
        &config,
        instrument,
        params,
    )?;
    eprintln!("\nResult written to: {}", path.display());
    Ok(())
}

/// Validate, load, simulate and write one backtest; returns the written path.
pub fn run_backtest_pipeline(
    data: &dyn DataPort,
    results: &dyn ResultPort,
    config: &dyn ConfigPort,
    instrument: Option<&str>,
    params: Vec<(String, ParameterValue)>,
) -> Result<PathBuf, FxtraderError> {
    validate_data_config(config)?;
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;

    let template = build_template(config)?;
    let params = params
        .into_iter()
        .fold(ParameterSet::new(), |set, (name, value)| set.with(name, value));
    let strategy = template.instantiate(&params)?;
    eprintln!("Strategy: {}", strategy.name());

    let series = load_series(data, config, instrument)?;
    let result = backtest_engine::run_backtest(
        &series,
        &strategy,
        &build_backtest_config(config),
        &build_metrics_options(config),
    )?;

    print_backtest_summary(&result);
    results.write_backtest(&result)
}

fn print_backtest_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results: {} on {} ===", result.strategy, result.instrument);
    eprintln!("Total Return:     {:.5}", m.total_return);
    eprintln!("Max Drawdown:     {:.5}", m.max_drawdown);
    eprintln!("Sharpe Ratio:     {:.3}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.3}", m.sortino_ratio);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
    eprintln!("Expectancy:       {:.5}", m.expectancy);
    if m.forced_closes > 0 {
        eprintln!("Forced Closes:    {}", m.forced_closes);
    }
}

pub fn run_optimize(
    config_path: &Path,
    instrument: Option<&str>,
    output: Option<&Path>,
    overrides: OptimizeOverrides,
) -> Result<(), FxtraderError> {
    let config = load_config(config_path)?;
    let (_, path) = run_optimize_pipeline(
        &data_adapter(&config),
        &result_adapter(output, &config),
        &config,
        instrument,
        &overrides,
    )?;
    eprintln!("\nResult written to: {}", path.display());
    Ok(())
}

/// Validate, load, search and write one optimization.
pub fn run_optimize_pipeline(
    data: &dyn DataPort,
    results: &dyn ResultPort,
    config: &dyn ConfigPort,
    instrument: Option<&str>,
    overrides: &OptimizeOverrides,
) -> Result<(OptimizationResult, PathBuf), FxtraderError> {
    validate_data_config(config)?;
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_optimize_config(config)?;

    let template = build_template(config)?;
    let domain = build_domain(config)?;
    let opt_config = build_optimizer_config(config, overrides)?;
    let series = load_series(data, config, instrument)?;

    eprintln!(
        "Optimizing {} over {} (ranking by {}, {})",
        template.name(),
        template.parameters().join(", "),
        opt_config.rank_by,
        opt_config.order,
    );

    let optimizer = Optimizer::new(&series, opt_config)?;
    let result = match config.get_string("optimize", "search").as_deref().map(str::trim) {
        Some("random") => optimizer
            .with_search(RandomSearch {
                samples: config.get_int("optimize", "samples", 1).max(1) as usize,
                seed: config.get_int("optimize", "seed", 0) as u64,
            })
            .optimize(&template, &domain)?,
        _ => optimizer.optimize(&template, &domain)?,
    };

    print_optimization_summary(&result);
    let path = results.write_optimization(&result)?;
    Ok((result, path))
}

fn print_optimization_summary(result: &OptimizationResult) {
    eprintln!(
        "\n{} candidates: {} evaluated, {} failed, {} skipped",
        result.candidates.len(),
        result.evaluated(),
        result.failed(),
        result.skipped(),
    );
    eprintln!(
        "\n=== Top {} by {} ({}) ===",
        result.best.len(),
        result.rank_by,
        result.order
    );
    for ranked in &result.best {
        eprintln!(
            "  #{:<3} {}  score {:.5}, {} trades",
            ranked.rank, ranked.parameters, ranked.score, ranked.metrics.total_trades,
        );
    }
}

pub fn run_validate(strategy_path: &Path) -> Result<(), FxtraderError> {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let config = load_config(strategy_path)?;
    validate_strategy_config(&config)?;

    for key in RULE_KEYS {
        let Some(text) = strategy_text(&config, key) else {
            continue;
        };
        eprintln!("\n{key}:");
        eprintln!("  Raw:    {}", text);
        let names = rule_parser::placeholders(&text).inspect_err(|e| {
            eprintln!("  error: {}", e.display_with_context(&text));
        })?;
        if names.is_empty() {
            eprintln!("  Parsed: {}", rule_parser::parse(&text)?);
        } else {
            eprintln!("  Params: {}", names.join(", "));
        }
    }

    let template = build_template(&config)?;
    if let Some(stop) = strategy_text(&config, "stop_loss") {
        eprintln!("\nstop_loss: {}", stop);
    }
    for constraint in template.constraints() {
        eprintln!("constraint: {}", constraint);
    }

    if config.has_section("parameters") {
        validate_optimize_config(&config)?;
        let domain = build_domain(&config)?;
        let candidates = GridSearch.candidates(&domain)?;
        eprintln!("\nParameter domain: {} candidates", candidates.len());
        for name in template.parameters() {
            if !domain.names().any(|n| n.eq_ignore_ascii_case(name)) {
                return Err(FxtraderError::ConfigMissing {
                    section: "parameters".into(),
                    key: name.clone(),
                });
            }
        }
    } else if template.parameters().is_empty() {
        template.instantiate(&ParameterSet::new())?;
    }

    eprintln!("\nStrategy configuration is valid.");
    Ok(())
}

pub fn run_info(config_path: &Path, instrument: Option<&str>) -> Result<(), FxtraderError> {
    let config = load_config(config_path)?;
    print_info(&data_adapter(&config), instrument)
}

pub fn print_info(adapter: &dyn DataPort, instrument: Option<&str>) -> Result<(), FxtraderError> {

    let instruments = match instrument {
        Some(i) => vec![i.trim().to_uppercase()],
        None => adapter.list_instruments()?,
    };
    if instruments.is_empty() {
        eprintln!("No instruments found");
    }

    for name in &instruments {
        match adapter.get_data_range(name) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} bars, {} to {}", name, count, first, last);
            }
            Ok(None) => {
                eprintln!("{}: no data found", name);
            }
            Err(e) => {
                eprintln!("error querying {}: {}", name, e);
            }
        }
    }
    Ok(())
}
