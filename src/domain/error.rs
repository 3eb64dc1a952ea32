//! Domain error types.

/// A parse error with position information for condition and rule parsing.
#[derive(Debug, Clone, thiserror::Error)]
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

/// A rule's parameter payload could not be read by its evaluator.
///
/// Aborts the whole score computation; no partial score is produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid params for {condition_type}: {reason}")]
pub struct EvaluationError {
    pub condition_type: String,
    pub reason: String,
}

/// Top-level error type for sigtrader.
#[derive(Debug, thiserror::Error)]
pub enum SigtraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

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

    #[error(transparent)]
    ConditionParse(#[from] ParseError),

    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("no analytics data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SigtraderError {
    pub fn validation(reason: impl Into<String>) -> Self {
        SigtraderError::Validation {
            reason: reason.into(),
        }
    }
}

impl From<&SigtraderError> for std::process::ExitCode {
    fn from(err: &SigtraderError) -> Self {
        let code: u8 = match err {
            SigtraderError::Io(_) => 1,
            SigtraderError::ConfigParse { .. }
            | SigtraderError::ConfigMissing { .. }
            | SigtraderError::ConfigInvalid { .. } => 2,
            SigtraderError::Data { .. } | SigtraderError::NoData { .. } => 3,
            SigtraderError::ConditionParse(_) | SigtraderError::Validation { .. } => 4,
            SigtraderError::Evaluation(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
