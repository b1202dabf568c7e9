//! Domain error types.

/// A parse error with position information for rule parsing.
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

/// Top-level error type for portsim.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
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
    RuleParse(#[from] ParseError),

    #[error("end date is the same as start date: {date}")]
    EmptyDateRange { date: chrono::NaiveDate },

    #[error("invalid interval: {value}")]
    InvalidInterval { value: String },

    #[error("period cannot be greater than {limit} days for {interval} intervals")]
    PeriodTooLong { limit: u32, interval: String },

    #[error("bad bar data in {file} row {row}: {reason}")]
    BarData {
        file: String,
        row: usize,
        reason: String,
    },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SimError> for std::process::ExitCode {
    fn from(err: &SimError) -> Self {
        let code: u8 = match err {
            SimError::Io(_) => 1,
            SimError::ConfigParse { .. }
            | SimError::ConfigMissing { .. }
            | SimError::ConfigInvalid { .. }
            | SimError::EmptyDateRange { .. }
            | SimError::InvalidInterval { .. }
            | SimError::PeriodTooLong { .. }
            | SimError::BarData { .. } => 2,
            SimError::RuleParse(_) => 3,
            SimError::NoData { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
