//! Data access port trait — the seam to the historical-price store.
//!
//! The engine consumes price history and instrument metadata through this
//! trait only; the bundled implementation is the CSV adapter, and tests
//! substitute a mock.

use crate::domain::error::SieveError;
use crate::domain::instrument::InstrumentInfo;
use crate::domain::ohlcv::Bar;

pub trait DataPort: Send + Sync {
    /// Up to `days` most recent daily bars for `ticker`, excluding the most
    /// recent `end_offset` days (the backtest truncation window).
    fn history(&self, ticker: &str, days: i64, end_offset: i64) -> Result<Vec<Bar>, SieveError>;

    /// Current (live) price for `ticker`.
    fn last_price(&self, ticker: &str) -> Result<f64, SieveError>;

    fn info(&self, ticker: &str) -> Result<InstrumentInfo, SieveError>;

    /// Every active ticker in the store.
    fn every_tickers(&self) -> Result<Vec<String>, SieveError>;

    fn exchange_tickers(&self, exchange: &str) -> Result<Vec<String>, SieveError>;

    fn index_tickers(&self, index: &str) -> Result<Vec<String>, SieveError>;

    fn is_exchange(&self, name: &str) -> bool;

    fn is_index(&self, name: &str) -> bool;

    fn is_ticker(&self, ticker: &str) -> bool;
}
