//! Per-instrument screen outcome.

use crate::domain::interpreter::ClauseOutcome;
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one screen against one instrument.
///
/// Created exactly once per instrument per run and immutable afterwards,
/// except for the backtest fields set by the backtest post-pass. Serialized
/// as the cache payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub screen: String,
    pub outcomes: Vec<ClauseOutcome>,
    pub price_current: f64,
    #[serde(default)]
    pub price_last: f64,
    #[serde(default)]
    pub backtest_success: bool,
    /// Set when the instrument itself failed (for example, a history-fetch
    /// error); such a result is never valid.
    #[serde(default)]
    pub error: Option<String>,
}

impl ScreenResult {
    pub fn valid(&self) -> bool {
        self.error.is_none() && !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.passed)
    }

    /// Mean clause score; 0.0 when there are no outcomes.
    pub fn score(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.outcomes.iter().map(|o| o.score).sum::<f64>() / self.outcomes.len() as f64
        }
    }
}

impl std::fmt::Display for ScreenResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:.2}, {}", self.ticker, self.score(), self.screen)
    }
}
