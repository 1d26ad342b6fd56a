//! Instrument handle with lazily fetched history and derived series.
//!
//! An `Instrument` is created once per screener run and owned by exactly one
//! shard while workers are active. History is fetched on first use through
//! the data port; derived series (SMA, RSI) are computed once per parameter
//! set and cached for the remaining clauses.

use crate::domain::error::SieveError;
use crate::domain::indicator;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentInfo {
    pub name: String,
    pub sector: String,
    pub beta: f64,
}

impl Default for InstrumentInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            sector: String::new(),
            beta: f64::NAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SeriesKey {
    High,
    Low,
    Close,
    Volume,
    Sma(usize),
    Rsi(usize),
}

pub struct Instrument {
    ticker: String,
    days: i64,
    end_offset: i64,
    port: Arc<dyn DataPort>,
    history: OnceLock<Result<Vec<Bar>, SieveError>>,
    info: OnceLock<InstrumentInfo>,
    derived: Mutex<HashMap<SeriesKey, Arc<Vec<f64>>>>,
}

impl Instrument {
    pub fn new(ticker: &str, days: i64, end_offset: i64, port: Arc<dyn DataPort>) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            days,
            end_offset,
            port,
            history: OnceLock::new(),
            info: OnceLock::new(),
            derived: Mutex::new(HashMap::new()),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Metadata snapshot; missing metadata degrades to the default rather
    /// than failing the instrument.
    pub fn info(&self) -> &InstrumentInfo {
        self.info.get_or_init(|| match self.port.info(&self.ticker) {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!("no metadata for {}: {}", self.ticker, err);
                InstrumentInfo::default()
            }
        })
    }

    pub fn history(&self) -> Result<&[Bar], SieveError> {
        let result = self
            .history
            .get_or_init(|| self.port.history(&self.ticker, self.days, self.end_offset));
        match result {
            Ok(bars) => Ok(bars.as_slice()),
            Err(err) => Err(err.clone()),
        }
    }

    pub fn high(&self) -> Result<Arc<Vec<f64>>, SieveError> {
        self.cached(SeriesKey::High, |bars| {
            bars.iter().map(|b| b.high).collect()
        })
    }

    pub fn low(&self) -> Result<Arc<Vec<f64>>, SieveError> {
        self.cached(SeriesKey::Low, |bars| bars.iter().map(|b| b.low).collect())
    }

    pub fn close(&self) -> Result<Arc<Vec<f64>>, SieveError> {
        self.cached(SeriesKey::Close, |bars| {
            bars.iter().map(|b| b.close).collect()
        })
    }

    pub fn volume(&self) -> Result<Arc<Vec<f64>>, SieveError> {
        self.cached(SeriesKey::Volume, |bars| {
            bars.iter().map(|b| b.volume as f64).collect()
        })
    }

    pub fn sma(&self, period: usize) -> Result<Arc<Vec<f64>>, SieveError> {
        let closes = self.close()?;
        self.cached(SeriesKey::Sma(period), |_| indicator::sma(&closes, period))
    }

    pub fn rsi(&self, period: usize) -> Result<Arc<Vec<f64>>, SieveError> {
        let closes = self.close()?;
        self.cached(SeriesKey::Rsi(period), |_| indicator::rsi(&closes, period))
    }

    pub fn beta(&self) -> f64 {
        self.info().beta
    }

    /// Close of the last bar in the (possibly truncated) window.
    pub fn window_last_price(&self) -> Result<f64, SieveError> {
        let bars = self.history()?;
        bars.last()
            .map(|b| b.close)
            .ok_or_else(|| SieveError::NoData {
                ticker: self.ticker.clone(),
                reason: "empty history".into(),
            })
    }

    fn cached<F>(&self, key: SeriesKey, build: F) -> Result<Arc<Vec<f64>>, SieveError>
    where
        F: FnOnce(&[Bar]) -> Vec<f64>,
    {
        if let Some(series) = self.derived.lock().unwrap().get(&key) {
            return Ok(Arc::clone(series));
        }
        let bars = self.history()?;
        let series = Arc::new(build(bars));
        self.derived
            .lock()
            .unwrap()
            .insert(key, Arc::clone(&series));
        Ok(series)
    }
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("ticker", &self.ticker)
            .field("days", &self.days)
            .field("end_offset", &self.end_offset)
            .finish()
    }
}
