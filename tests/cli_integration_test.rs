//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, build_template, build_domain)
//! - Validate command with real INI files on disk
//! - Backtest and optimize pipelines with MockDataPort
//! - End-to-end runs over CSV data and INI files in a temp directory

mod common;

use common::*;
use fxtrader::adapters::file_config_adapter::FileConfigAdapter;
use fxtrader::adapters::json_result_adapter::JsonResultAdapter;
use fxtrader::cli::{self, OptimizeOverrides};
use fxtrader::domain::error::FxtraderError;
use fxtrader::domain::metrics::RankBy;
use fxtrader::domain::optimizer::SortOrder;
use fxtrader::domain::parameter::ParameterValue;
use fxtrader::domain::template::StrategyTemplate;
use std::path::PathBuf;

const VALID_INI: &str = r#"
[data]
directory = data
instrument = EUR_USD

[backtest]
spread = 0.0002
commission_per_trade = 0.5
commission_pct = 0.0
position_size = 2.0
exclude_forced_close = true

[strategy]
name = SMA Cross
entry_long = CROSS_ABOVE(SMA($fast), SMA($slow))
exit_long = CROSS_BELOW(SMA($fast), SMA($slow))
entry_short = CROSS_BELOW(SMA($fast), SMA($slow))
exit_short = CROSS_ABOVE(SMA($fast), SMA($slow))

[constraints]
ordered = fast < slow

[parameters]
fast = 3, 5
slow = 10..20 step 10

[optimize]
rank_by = sharpe_ratio
order = desc
top_n = 2
workers = 2
"#;

fn params(pairs: &[(&str, i64)]) -> Vec<(String, ParameterValue)> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), ParameterValue::Int(*value)))
        .collect()
}

mod config_loading {
    use super::*;

    #[test]
    fn build_backtest_config_valid_full() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter);

        assert!((config.spread - 0.0002).abs() < f64::EPSILON);
        assert!((config.commission_per_trade - 0.5).abs() < f64::EPSILON);
        assert!((config.commission_pct - 0.0).abs() < f64::EPSILON);
        assert!((config.position_size - 2.0).abs() < f64::EPSILON);
        assert!(cli::build_metrics_options(&adapter).exclude_forced_close);
    }

    #[test]
    fn build_backtest_config_uses_defaults() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        let config = cli::build_backtest_config(&adapter);

        assert_eq!(config.spread, 0.0);
        assert_eq!(config.commission_per_trade, 0.0);
        assert_eq!(config.position_size, 1.0);
        assert!(!cli::build_metrics_options(&adapter).exclude_forced_close);
    }

    #[test]
    fn build_optimizer_config_from_file() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_optimizer_config(&adapter, &OptimizeOverrides::default()).unwrap();

        assert_eq!(config.rank_by, RankBy::SharpeRatio);
        assert_eq!(config.order, SortOrder::Descending);
        assert_eq!(config.top_n, 2);
        assert_eq!(config.workers, 2);
        assert!(config.metrics.exclude_forced_close);
    }

    #[test]
    fn build_optimizer_config_bad_rank_by() {
        let adapter = FileConfigAdapter::from_string("[optimize]\nrank_by = cagr\n").unwrap();
        let err = cli::build_optimizer_config(&adapter, &OptimizeOverrides::default()).unwrap_err();
        assert!(matches!(err, FxtraderError::ConfigInvalid { key, .. } if key == "rank_by"));
    }
}

mod template_building {
    use super::*;

    #[test]
    fn build_template_collects_parameters() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let template = cli::build_template(&adapter).unwrap();

        assert_eq!(template.name(), "SMA Cross");
        assert_eq!(template.parameters(), ["fast", "slow"]);
        assert_eq!(template.constraints()[0].to_string(), "fast < slow");
    }

    #[test]
    fn build_template_invalid_rule() {
        let ini = "[strategy]\nentry_long = @@invalid@@\nexit_long = BELOW(close, 1)\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = cli::build_template(&adapter).unwrap_err();
        assert!(matches!(err, FxtraderError::RuleParse(_)));
    }

    #[test]
    fn build_domain_enumerates_sections() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let domain = cli::build_domain(&adapter).unwrap();
        let names: Vec<&str> = domain.names().collect();
        assert_eq!(names, vec!["fast", "slow"]);
        assert_eq!(domain.dimensions()[1].enumerate().unwrap().len(), 2);
    }
}

mod validate {
    use super::*;

    #[test]
    fn validate_valid_config_succeeds() {
        let file = write_temp_ini(VALID_INI);
        assert!(cli::run_validate(file.path()).is_ok());
    }

    #[test]
    fn validate_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/path/strategy.ini");
        assert!(matches!(
            cli::run_validate(&path),
            Err(FxtraderError::ConfigParse { .. })
        ));
    }

    #[test]
    fn validate_invalid_rule_fails() {
        let file = write_temp_ini(
            "[strategy]\nentry_long = ABOVE(close\nexit_long = BELOW(close, 1)\n",
        );
        assert!(matches!(
            cli::run_validate(file.path()),
            Err(FxtraderError::RuleParse(_))
        ));
    }

    #[test]
    fn validate_parameter_not_in_domain_fails() {
        let ini = "[strategy]\n\
                   entry_long = ABOVE(close, SMA($n))\n\
                   exit_long = BELOW(close, SMA($n))\n\
                   [parameters]\nm = 1, 2\n";
        let file = write_temp_ini(ini);
        assert!(matches!(
            cli::run_validate(file.path()),
            Err(FxtraderError::ConfigMissing { key, .. }) if key == "n"
        ));
    }
}

mod pipeline_mock {
    use super::*;

    fn mock() -> MockDataPort {
        MockDataPort::new().with_bars("EUR_USD", make_bars(&oscillating(200, 1.10, 0.02, 40.0)))
    }

    #[test]
    fn backtest_pipeline_writes_result() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let sink = JsonResultAdapter::new(out.path().to_path_buf());

        let path = cli::run_backtest_pipeline(
            &mock(),
            &sink,
            &config,
            None,
            params(&[("fast", 5), ("slow", 20)]),
        )
        .unwrap();

        assert!(path.exists(), "result file should be written");
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "EUR_USD_sma_cross_fast_5_slow_20_backtest.json"
        );
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["strategy"], "SMA Cross {fast=5, slow=20}");
        assert!(value["ledger"]["trades"].as_array().unwrap().len() > 1);
    }

    #[test]
    fn backtest_pipeline_unbound_parameter_fails() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let sink = JsonResultAdapter::new(out.path().to_path_buf());

        let err = cli::run_backtest_pipeline(&mock(), &sink, &config, None, params(&[("fast", 5)]))
            .unwrap_err();
        assert!(matches!(err, FxtraderError::InvalidParameter { name, .. } if name == "slow"));
    }

    #[test]
    fn backtest_pipeline_unknown_instrument_fails() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let sink = JsonResultAdapter::new(out.path().to_path_buf());
        let data = mock().with_error("USD_JPY", "no such file");

        let err = cli::run_backtest_pipeline(
            &data,
            &sink,
            &config,
            Some("usd_jpy"),
            params(&[("fast", 5), ("slow", 20)]),
        )
        .unwrap_err();
        assert!(matches!(err, FxtraderError::DataSource { .. }));
    }

    #[test]
    fn optimize_pipeline_ranks_grid() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let sink = JsonResultAdapter::new(out.path().to_path_buf());

        let (result, path) = cli::run_optimize_pipeline(
            &mock(),
            &sink,
            &config,
            None,
            &OptimizeOverrides::default(),
        )
        .unwrap();

        assert_eq!(result.candidates.len(), 4);
        assert_eq!(result.evaluated(), 4);
        assert_eq!(result.best.len(), 2);
        assert_eq!(result.rank_by, RankBy::SharpeRatio);
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with("EUR_USD_sma_cross_optimize.json"));
    }

    #[test]
    fn optimize_pipeline_random_search_subset() {
        let ini = format!("{VALID_INI}search = random\nsamples = 3\nseed = 7\n");
        let config = FileConfigAdapter::from_string(&ini).unwrap();
        let out = tempfile::TempDir::new().unwrap();
        let sink = JsonResultAdapter::new(out.path().to_path_buf());

        let (result, _) = cli::run_optimize_pipeline(
            &mock(),
            &sink,
            &config,
            None,
            &OptimizeOverrides {
                workers: Some(1),
                rank_by: Some(RankBy::TotalReturn),
                top: Some(1),
            },
        )
        .unwrap();

        assert_eq!(result.search, "random");
        assert_eq!(result.candidates.len(), 3);
        assert_eq!(result.best.len(), 1);
        assert_eq!(result.rank_by, RankBy::TotalReturn);
    }
}

mod end_to_end {
    use super::*;

    #[test]
    fn backtest_from_csv_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        write_csv(&data_dir, "EUR_USD", &make_bars(&oscillating(120, 1.10, 0.02, 30.0)));

        let ini = VALID_INI.replace(
            "directory = data",
            &format!("directory = {}", data_dir.display()),
        );
        let file = write_temp_ini(&ini);
        let out = dir.path().join("results");

        cli::run_backtest(
            file.path(),
            None,
            Some(&out),
            params(&[("fast", 3), ("slow", 10)]),
        )
        .unwrap();

        let written: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(written.len(), 1);
    }

    #[test]
    fn info_lists_csv_instruments() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv(dir.path(), "EUR_USD", &make_bars(&trending(10, 1.1, 0.001)));
        write_csv(dir.path(), "GBP_USD", &make_bars(&trending(5, 1.3, 0.001)));
        let file = write_temp_ini(&format!("[data]\ndirectory = {}\n", dir.path().display()));

        assert!(cli::run_info(file.path(), None).is_ok());
        assert!(cli::run_info(file.path(), Some("eur_usd")).is_ok());
    }
}
