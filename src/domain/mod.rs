//! Core domain types and logic.

pub mod ohlcv;
pub mod timeseries;
pub mod parameter;
pub mod position;
pub mod execution;
pub mod indicator;
pub mod indicator_helpers;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod signal;
pub mod strategy;
pub mod template;
pub mod backtest;
pub mod metrics;
pub mod optimizer;
pub mod config_validation;
pub mod error;
