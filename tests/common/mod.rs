#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use marketsieve::domain::error::SieveError;
use marketsieve::domain::instrument::InstrumentInfo;
pub use marketsieve::domain::ohlcv::Bar;
use marketsieve::ports::data_port::DataPort;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct MockDataPort {
    pub bars: HashMap<String, Vec<Bar>>,
    pub infos: HashMap<String, InstrumentInfo>,
    pub live_prices: HashMap<String, f64>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            infos: HashMap::new(),
            live_prices: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        if let Some(last) = bars.last() {
            self.live_prices.insert(ticker.to_string(), last.close);
        }
        self.bars.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_info(mut self, ticker: &str, name: &str, sector: &str, beta: f64) -> Self {
        self.infos.insert(
            ticker.to_string(),
            InstrumentInfo {
                name: name.to_string(),
                sector: sector.to_string(),
                beta,
            },
        );
        self
    }

    pub fn with_live_price(mut self, ticker: &str, price: f64) -> Self {
        self.live_prices.insert(ticker.to_string(), price);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn history(&self, ticker: &str, days: i64, end_offset: i64) -> Result<Vec<Bar>, SieveError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(SieveError::NoData {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        let mut bars = self.bars.get(ticker).cloned().unwrap_or_default();
        let keep = bars.len().saturating_sub(end_offset.max(0) as usize);
        bars.truncate(keep);
        let days = days.max(0) as usize;
        if bars.len() > days {
            bars = bars.split_off(bars.len() - days);
        }
        Ok(bars)
    }

    fn last_price(&self, ticker: &str) -> Result<f64, SieveError> {
        self.live_prices
            .get(ticker)
            .copied()
            .ok_or_else(|| SieveError::UnknownTicker {
                ticker: ticker.to_string(),
            })
    }

    fn info(&self, ticker: &str) -> Result<InstrumentInfo, SieveError> {
        Ok(self.infos.get(ticker).cloned().unwrap_or_default())
    }

    fn every_tickers(&self) -> Result<Vec<String>, SieveError> {
        let mut tickers: Vec<String> = self.bars.keys().cloned().collect();
        tickers.extend(self.errors.keys().cloned());
        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }

    fn exchange_tickers(&self, _exchange: &str) -> Result<Vec<String>, SieveError> {
        self.every_tickers()
    }

    fn index_tickers(&self, _index: &str) -> Result<Vec<String>, SieveError> {
        self.every_tickers()
    }

    fn is_exchange(&self, name: &str) -> bool {
        name == "NYSE"
    }

    fn is_index(&self, name: &str) -> bool {
        name == "SP500"
    }

    fn is_ticker(&self, ticker: &str) -> bool {
        self.bars.contains_key(ticker) || self.errors.contains_key(ticker)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(ticker: &str, date: NaiveDate, close: f64) -> Bar {
    Bar {
        ticker: ticker.to_string(),
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1_000_000,
    }
}

/// `len` daily bars ending today, with closes produced by `close_at(i)`
/// where `i` runs oldest to newest.
pub fn bar_series(ticker: &str, len: usize, close_at: impl Fn(usize) -> f64) -> Vec<Bar> {
    let today = chrono::Local::now().date_naive();
    let start = today.checked_sub_days(Days::new(len as u64 - 1)).unwrap();
    (0..len)
        .map(|i| {
            let d = start.checked_add_days(Days::new(i as u64)).unwrap();
            make_bar(ticker, d, close_at(i))
        })
        .collect()
}

pub fn flat_series(ticker: &str, len: usize, close: f64) -> Vec<Bar> {
    bar_series(ticker, len, |_| close)
}

/// Write a screen document into `dir` as `{name}.screen`.
pub fn write_screen(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(format!("{name}.screen")), body).unwrap();
}

/// A prelude that passes everything: close > 0.
pub const PASSING_PRELUDE: &str = r#"[
  {
    "note": "positive close",
    "base": {"technical": "close"},
    "criteria": {"technical": "value", "conditional": "gt", "value": 0.0}
  }
]"#;
