//! Core domain types and logic.

pub mod ohlcv;
pub mod clause;
pub mod screen;
pub mod indicator;
pub mod instrument;
pub mod interpreter;
pub mod result;
pub mod report;
pub mod universe;
pub mod screener;
pub mod aggregate;
pub mod error;
