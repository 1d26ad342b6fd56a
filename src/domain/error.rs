//! Domain error types.
//!
//! The taxonomy matters for who recovers:
//! - Configuration errors are fatal to a `Screener` at construction.
//! - Schema errors fail a run during the pre-flight compile, before any
//!   worker starts; callers observe them through the run phase.
//! - Per-instrument data errors are confined to that instrument's result.
//! - Cache I/O errors are swallowed by the cache adapter and reported as
//!   misses; they never reach a caller.

/// Top-level error type for marketsieve.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SieveError {
    #[error("universe not specified")]
    EmptyUniverse,

    #[error("screen not specified")]
    EmptyScreen,

    #[error("invalid number of days: {days} (minimum 30)")]
    InvalidDays { days: i64 },

    #[error("invalid backtest days: {days}")]
    InvalidBacktestDays { days: i64 },

    #[error("universe not found: {universe}")]
    UnknownUniverse { universe: String },

    #[error("screen document not found: {name}")]
    ScreenNotFound { name: String },

    #[error("screen document {name} is malformed: {reason}")]
    ScreenMalformed { name: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid {field} in clause {clause} ({note}): \"{value}\"")]
    Schema {
        clause: usize,
        note: String,
        field: &'static str,
        value: String,
    },

    #[error("no data for {ticker}: {reason}")]
    NoData { ticker: String, reason: String },

    #[error("unknown ticker: {ticker}")]
    UnknownTicker { ticker: String },

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SieveError {
    fn from(err: std::io::Error) -> Self {
        SieveError::Io(err.to_string())
    }
}

impl From<&SieveError> for std::process::ExitCode {
    fn from(err: &SieveError) -> Self {
        let code: u8 = match err {
            SieveError::Io(_) => 1,
            SieveError::ConfigParse { .. } => 2,
            SieveError::EmptyUniverse
            | SieveError::EmptyScreen
            | SieveError::InvalidDays { .. }
            | SieveError::InvalidBacktestDays { .. }
            | SieveError::UnknownUniverse { .. } => 3,
            SieveError::ScreenNotFound { .. }
            | SieveError::ScreenMalformed { .. }
            | SieveError::Schema { .. } => 4,
            SieveError::NoData { .. } | SieveError::UnknownTicker { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
