//! Clause data structures.
//!
//! A screen document is a JSON array of clause records. The raw document
//! types ([`ClauseDoc`], [`OperandDoc`], [`CriteriaDoc`]) keep the enum-like
//! fields as plain strings so a malformed document can be represented and
//! reported precisely. [`ClauseDoc::compile`] validates every enum field and
//! produces the typed form the interpreter runs against; enums are validated
//! exactly once, at compile time, never per evaluation.

use crate::domain::error::SieveError;
use serde::{Deserialize, Serialize};

/// Source series or derived technical a clause operand draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technical {
    High,
    Low,
    Close,
    Volume,
    Sma,
    Rsi,
    Beta,
    /// Always passes; no series is fetched.
    Nop,
    /// Literal criteria value, wrapped as a one-element series.
    Value,
}

impl Technical {
    fn parse(s: &str, criteria: bool) -> Option<Technical> {
        let t = match s {
            "high" => Technical::High,
            "low" => Technical::Low,
            "close" => Technical::Close,
            "volume" => Technical::Volume,
            "sma" => Technical::Sma,
            "rsi" => Technical::Rsi,
            "beta" => Technical::Beta,
            "nop" => Technical::Nop,
            "value" if criteria => Technical::Value,
            _ => return None,
        };
        Some(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conditional {
    Lt,
    Eq,
    Gt,
}

impl Conditional {
    fn parse(s: &str) -> Option<Conditional> {
        match s {
            "lt" => Some(Conditional::Lt),
            "eq" => Some(Conditional::Eq),
            "gt" => Some(Conditional::Gt),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Conditional::Lt => "<",
            Conditional::Eq => "==",
            Conditional::Gt => ">",
        }
    }
}

/// Policy for collapsing a criteria series to one comparable scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesReducer {
    Min,
    Max,
    /// Take the last element.
    Na,
}

impl SeriesReducer {
    fn parse(s: &str) -> Option<SeriesReducer> {
        match s {
            "min" => Some(SeriesReducer::Min),
            "max" => Some(SeriesReducer::Max),
            "na" => Some(SeriesReducer::Na),
            _ => None,
        }
    }
}

/// Compiled base operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub technical: Technical,
    pub length: usize,
    pub start: i64,
    pub stop: i64,
    pub reducer: SeriesReducer,
    pub factor: f64,
}

/// Compiled criteria operand: an [`Operand`] plus the comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    pub operand: Operand,
    pub conditional: Conditional,
    pub value: f64,
}

/// One compiled screen rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub note: String,
    pub base: Operand,
    pub criteria: Criteria,
}

fn default_factor() -> f64 {
    1.0
}

fn default_series() -> String {
    "na".to_string()
}

/// Raw operand record as it appears in a screen document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperandDoc {
    pub technical: String,
    #[serde(default)]
    pub length: usize,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub stop: i64,
    #[serde(default = "default_series")]
    pub series: String,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

/// Raw criteria record as it appears in a screen document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaDoc {
    pub technical: String,
    pub conditional: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub length: usize,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub stop: i64,
    #[serde(default = "default_series")]
    pub series: String,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

/// Raw clause record as it appears in a screen document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseDoc {
    #[serde(default)]
    pub note: String,
    pub base: OperandDoc,
    pub criteria: CriteriaDoc,
}

impl ClauseDoc {
    /// Validate all five enum fields and produce the typed clause.
    ///
    /// `index` is the clause's position within the screen, used to make
    /// schema errors actionable.
    pub fn compile(&self, index: usize) -> Result<Clause, SieveError> {
        let schema = |field: &'static str, value: &str| SieveError::Schema {
            clause: index,
            note: self.note.clone(),
            field,
            value: value.to_string(),
        };

        let base_technical = Technical::parse(&self.base.technical, false)
            .ok_or_else(|| schema("base technical", &self.base.technical))?;
        let base_reducer = SeriesReducer::parse(&self.base.series)
            .ok_or_else(|| schema("base series", &self.base.series))?;
        let criteria_technical = Technical::parse(&self.criteria.technical, true)
            .ok_or_else(|| schema("criteria technical", &self.criteria.technical))?;
        let conditional = Conditional::parse(&self.criteria.conditional)
            .ok_or_else(|| schema("criteria conditional", &self.criteria.conditional))?;
        let criteria_reducer = SeriesReducer::parse(&self.criteria.series)
            .ok_or_else(|| schema("criteria series", &self.criteria.series))?;

        Ok(Clause {
            note: self.note.clone(),
            base: Operand {
                technical: base_technical,
                length: self.base.length,
                start: self.base.start,
                stop: self.base.stop,
                reducer: base_reducer,
                factor: self.base.factor,
            },
            criteria: Criteria {
                operand: Operand {
                    technical: criteria_technical,
                    length: self.criteria.length,
                    start: self.criteria.start,
                    stop: self.criteria.stop,
                    reducer: criteria_reducer,
                    factor: self.criteria.factor,
                },
                conditional,
                value: self.criteria.value,
            },
        })
    }
}
