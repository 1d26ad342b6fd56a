//! Clause evaluation engine.
//!
//! Evaluates one compiled clause against one instrument's series, producing
//! a [`ClauseOutcome`].
//!
//! # Evaluation semantics
//!
//! - `nop` base: short-circuits to `passed = true`, `score = 0`, no series
//!   is fetched.
//! - Operand series are sliced with Python-slice bounds: `0` means open on
//!   that side, negative values count from the end.
//! - Base scalar: last element of the sliced series, times `factor`.
//! - Criteria scalar: sliced series collapsed per the reducer (`na` = last,
//!   `min`, `max`), times `factor`; the `value` technical wraps the literal
//!   as a one-element series.
//! - Empty base or criteria series is a data warning: the clause fails with
//!   score 0 and the run continues.
//! - A history-fetch failure is a data error and propagates to the caller.
//!
//! # Scoring
//!
//! `score` is the signed relative margin of the comparison, oriented so a
//! passing clause scores positive: `(base - value) / max(|value|, 1)` for
//! `gt`, negated for `lt`, and `-|base - value| / max(|value|, 1)` for `eq`
//! (a perfect match scores 0, the best possible `eq` score). Monotonic in
//! the compared scalars.

use crate::domain::clause::{Clause, Conditional, Operand, SeriesReducer, Technical};
use crate::domain::error::SieveError;
use crate::domain::instrument::Instrument;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClauseOutcome {
    pub passed: bool,
    pub score: f64,
    pub description: String,
}

pub fn evaluate(instrument: &Instrument, clause: &Clause) -> Result<ClauseOutcome, SieveError> {
    if clause.base.technical == Technical::Nop {
        return Ok(ClauseOutcome {
            passed: true,
            score: 0.0,
            description: format!("{}: nop", clause.note),
        });
    }

    let base_series = fetch_series(instrument, &clause.base, clause.criteria.value)?;
    let base_sliced = slice(&base_series, clause.base.start, clause.base.stop);

    let Some(last) = base_sliced.last() else {
        tracing::warn!("no technical information for {}", instrument.ticker());
        return Ok(warning_outcome(clause, instrument.ticker()));
    };
    let base = last * clause.base.factor;

    let criteria_series = fetch_series(instrument, &clause.criteria.operand, clause.criteria.value)?;
    let criteria_sliced = slice(
        &criteria_series,
        clause.criteria.operand.start,
        clause.criteria.operand.stop,
    );

    let Some(reduced) = reduce(criteria_sliced, clause.criteria.operand.reducer) else {
        tracing::warn!("no criteria data for {}", instrument.ticker());
        return Ok(warning_outcome(clause, instrument.ticker()));
    };
    let value = reduced * clause.criteria.operand.factor;

    let margin = base - value;
    let denom = value.abs().max(1.0);
    let (passed, score) = match clause.criteria.conditional {
        Conditional::Lt => (base < value, -margin / denom),
        Conditional::Eq => (margin.abs() < EPSILON, -margin.abs() / denom),
        Conditional::Gt => (base > value, margin / denom),
    };

    Ok(ClauseOutcome {
        passed,
        score,
        description: format!(
            "{}: {}({})/{:.2}*{:.2} {} {}({})/{:.2}*{:.2}",
            clause.note,
            clause.base.technical,
            clause.base.length,
            base,
            clause.base.factor,
            clause.criteria.conditional.symbol(),
            clause.criteria.operand.technical,
            clause.criteria.operand.length,
            value,
            clause.criteria.operand.factor,
        ),
    })
}

fn warning_outcome(clause: &Clause, ticker: &str) -> ClauseOutcome {
    ClauseOutcome {
        passed: false,
        score: 0.0,
        description: format!("{}: no data for {}", clause.note, ticker),
    }
}

fn fetch_series(
    instrument: &Instrument,
    operand: &Operand,
    literal: f64,
) -> Result<Vec<f64>, SieveError> {
    let series = match operand.technical {
        Technical::High => instrument.high()?.to_vec(),
        Technical::Low => instrument.low()?.to_vec(),
        Technical::Close => instrument.close()?.to_vec(),
        Technical::Volume => instrument.volume()?.to_vec(),
        Technical::Sma => instrument.sma(operand.length)?.to_vec(),
        Technical::Rsi => instrument.rsi(operand.length)?.to_vec(),
        Technical::Beta => {
            let beta = instrument.beta();
            if beta.is_finite() {
                vec![beta]
            } else {
                Vec::new()
            }
        }
        Technical::Value => vec![literal],
        // Base nop short-circuits before fetching; a criteria nop has no
        // series to offer and degrades to the empty-series warning.
        Technical::Nop => Vec::new(),
    };
    Ok(series)
}

/// Python-slice bounds over a series: `0` is open on that side, negative
/// indices count from the end, out-of-range bounds clamp.
fn slice(series: &[f64], start: i64, stop: i64) -> &[f64] {
    let len = series.len() as i64;

    let begin = if start == 0 {
        0
    } else if start < 0 {
        (len + start).max(0)
    } else {
        start.min(len)
    };

    let end = if stop == 0 {
        len
    } else if stop < 0 {
        (len + stop).max(0)
    } else {
        stop.min(len)
    };

    if begin >= end {
        &[]
    } else {
        &series[begin as usize..end as usize]
    }
}

fn reduce(series: &[f64], reducer: SeriesReducer) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    let value = match reducer {
        SeriesReducer::Na => *series.last().unwrap(),
        SeriesReducer::Min => series.iter().copied().fold(f64::INFINITY, f64::min),
        SeriesReducer::Max => series.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    Some(value)
}

impl std::fmt::Display for Technical {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Technical::High => "high",
            Technical::Low => "low",
            Technical::Close => "close",
            Technical::Volume => "volume",
            Technical::Sma => "sma",
            Technical::Rsi => "rsi",
            Technical::Beta => "beta",
            Technical::Nop => "nop",
            Technical::Value => "value",
        };
        write!(f, "{name}")
    }
}
