//! Configuration validation.
//!
//! Checks every section the CLI reads before any data is loaded, so a bad
//! file fails fast with the section and key at fault.

use crate::domain::error::FxtraderError;
use crate::domain::metrics::RankBy;
use crate::domain::optimizer::parameter_space::Dimension;
use crate::domain::optimizer::SortOrder;
use crate::ports::config_port::ConfigPort;
use chrono::{DateTime, NaiveDate, Utc};

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FxtraderError {
    FxtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> FxtraderError {
    FxtraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Non-empty string value, trimmed.
fn present(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a `[data]` bound: RFC 3339 or a plain date (midnight UTC).
pub fn parse_bound(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), FxtraderError> {
    let mut bounds = Vec::new();
    for key in ["start", "end"] {
        if let Some(raw) = present(config, "data", key) {
            let ts = parse_bound(&raw).ok_or_else(|| {
                invalid("data", key, "invalid date (expected YYYY-MM-DD or RFC 3339)")
            })?;
            bounds.push(ts);
        }
    }
    if let [start, end] = bounds[..] {
        if start > end {
            return Err(invalid("data", "start", "start must not be after end"));
        }
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), FxtraderError> {
    for key in ["spread", "commission_per_trade", "commission_pct"] {
        let value = config.get_double("backtest", key, 0.0);
        if !value.is_finite() || value < 0.0 {
            return Err(invalid("backtest", key, format!("{key} must be non-negative")));
        }
    }
    let size = config.get_double("backtest", "position_size", 1.0);
    if !size.is_finite() || size <= 0.0 {
        return Err(invalid("backtest", "position_size", "position_size must be positive"));
    }
    let sizing = present(config, "backtest", "sizing").map(|v| v.to_ascii_lowercase());
    match sizing.as_deref() {
        None | Some("fixed") => {}
        Some("risk") => {
            let account = config.get_double("backtest", "account", 10_000.0);
            if !account.is_finite() || account <= 0.0 {
                return Err(invalid("backtest", "account", "account must be positive"));
            }
            let risk = config.get_double("backtest", "risk_pct", 1.0);
            if !(risk > 0.0 && risk <= 100.0) {
                return Err(invalid("backtest", "risk_pct", "risk_pct must be in (0, 100]"));
            }
        }
        Some(other) => {
            return Err(invalid(
                "backtest",
                "sizing",
                format!("unknown sizing '{other}', expected fixed or risk"),
            ));
        }
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), FxtraderError> {
    let entry_long = present(config, "strategy", "entry_long");
    let entry_short = present(config, "strategy", "entry_short");
    if entry_long.is_none() && entry_short.is_none() {
        return Err(missing("strategy", "entry_long"));
    }
    if entry_long.is_some() && present(config, "strategy", "exit_long").is_none() {
        return Err(missing("strategy", "exit_long"));
    }
    if entry_short.is_some() && present(config, "strategy", "exit_short").is_none() {
        return Err(missing("strategy", "exit_short"));
    }
    Ok(())
}

pub fn validate_optimize_config(config: &dyn ConfigPort) -> Result<(), FxtraderError> {
    if let Some(raw) = present(config, "optimize", "rank_by") {
        raw.parse::<RankBy>()
            .map_err(|reason| invalid("optimize", "rank_by", reason))?;
    }
    if let Some(raw) = present(config, "optimize", "order") {
        raw.parse::<SortOrder>()
            .map_err(|reason| invalid("optimize", "order", reason))?;
    }
    if config.get_int("optimize", "top_n", 1) < 1 {
        return Err(invalid("optimize", "top_n", "top_n must be at least 1"));
    }
    if config.get_int("optimize", "workers", 0) < 0 {
        return Err(invalid("optimize", "workers", "workers must be non-negative"));
    }
    match present(config, "optimize", "search").as_deref() {
        None | Some("grid") => {}
        Some("random") => {
            if config.get_int("optimize", "samples", 0) < 1 {
                return Err(invalid(
                    "optimize",
                    "samples",
                    "random search needs samples >= 1",
                ));
            }
        }
        Some(other) => {
            return Err(invalid(
                "optimize",
                "search",
                format!("unknown search '{other}', expected grid or random"),
            ));
        }
    }

    let keys = config.keys("parameters");
    if keys.is_empty() {
        return Err(missing("parameters", "<name>"));
    }
    for key in keys {
        let raw = config.get_string("parameters", &key).unwrap_or_default();
        Dimension::parse(key.as_str(), &raw).map_err(|reason| invalid("parameters", &key, reason))?;
    }
    Ok(())
}
