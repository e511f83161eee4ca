//! Domain error types.

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for fxtrader.
#[derive(Debug, thiserror::Error)]
pub enum FxtraderError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("insufficient data: have {bars} bars, need {required}")]
    InsufficientData { bars: usize, required: usize },

    #[error("empty parameter domain: {reason}")]
    EmptyDomain { reason: String },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("invalid timeseries: {reason}")]
    InvalidSeries { reason: String },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("worker pool error: {reason}")]
    WorkerPool { reason: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FxtraderError {
    pub(crate) fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        FxtraderError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<&FxtraderError> for std::process::ExitCode {
    fn from(err: &FxtraderError) -> Self {
        let code: u8 = match err {
            FxtraderError::Io(_) | FxtraderError::Serialization(_) => 1,
            FxtraderError::ConfigParse { .. }
            | FxtraderError::ConfigMissing { .. }
            | FxtraderError::ConfigInvalid { .. } => 2,
            FxtraderError::DataSource { .. }
            | FxtraderError::InvalidBar { .. }
            | FxtraderError::InvalidSeries { .. } => 3,
            FxtraderError::RuleParse(_)
            | FxtraderError::RuleInvalid { .. }
            | FxtraderError::InvalidParameter { .. } => 4,
            FxtraderError::InsufficientData { .. } | FxtraderError::EmptyDomain { .. } => 5,
            FxtraderError::WorkerPool { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_caret_context() {
        let err = ParseError {
            message: "expected ')'".into(),
            position: 4,
        };
        let rendered = err.display_with_context("SMA(20");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "SMA(20");
        assert_eq!(lines[1], "    ^");
        assert!(lines[2].contains("position 4"));
    }

    #[test]
    fn insufficient_data_message() {
        let err = FxtraderError::InsufficientData {
            bars: 10,
            required: 21,
        };
        assert_eq!(err.to_string(), "insufficient data: have 10 bars, need 21");
    }

    #[test]
    fn rule_parse_converts_from_parse_error() {
        let err: FxtraderError = ParseError {
            message: "bad".into(),
            position: 0,
        }
        .into();
        assert!(matches!(err, FxtraderError::RuleParse(_)));
    }
}
