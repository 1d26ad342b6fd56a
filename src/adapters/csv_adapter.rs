//! CSV file data adapter.
//!
//! Expects a data directory holding one `universe.csv` membership file with
//! columns `ticker,name,sector,beta,exchange,index` and one `{TICKER}.csv`
//! history per instrument with columns `date,open,high,low,close,volume`
//! (header row, dates `%Y-%m-%d`). Membership is read once at construction;
//! histories are read per request.

use crate::domain::error::SieveError;
use crate::domain::instrument::InstrumentInfo;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct Membership {
    info: InstrumentInfo,
    exchange: String,
    index: String,
}

pub struct CsvAdapter {
    base_path: PathBuf,
    members: BTreeMap<String, Membership>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Result<Self, SieveError> {
        let members = load_members(&base_path)?;
        Ok(Self { base_path, members })
    }

    fn history_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    fn read_all_bars(&self, ticker: &str) -> Result<Vec<Bar>, SieveError> {
        let path = self.history_path(ticker);
        let content = std::fs::read_to_string(&path).map_err(|e| SieveError::NoData {
            ticker: ticker.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| SieveError::NoData {
                ticker: ticker.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;

            let field = |i: usize, name: &str| {
                record
                    .get(i)
                    .map(|s| s.to_string())
                    .ok_or_else(|| SieveError::NoData {
                        ticker: ticker.to_string(),
                        reason: format!("missing {name} column"),
                    })
            };

            let date = NaiveDate::parse_from_str(&field(0, "date")?, "%Y-%m-%d").map_err(|e| {
                SieveError::NoData {
                    ticker: ticker.to_string(),
                    reason: format!("invalid date: {e}"),
                }
            })?;

            let number = |i: usize, name: &str| -> Result<f64, SieveError> {
                field(i, name)?.parse().map_err(|e| SieveError::NoData {
                    ticker: ticker.to_string(),
                    reason: format!("invalid {name} value: {e}"),
                })
            };

            bars.push(Bar {
                ticker: ticker.to_string(),
                date,
                open: number(1, "open")?,
                high: number(2, "high")?,
                low: number(3, "low")?,
                close: number(4, "close")?,
                volume: number(5, "volume")? as i64,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn history(&self, ticker: &str, days: i64, end_offset: i64) -> Result<Vec<Bar>, SieveError> {
        let mut bars = self.read_all_bars(ticker)?;
        let end = bars.len().saturating_sub(end_offset.max(0) as usize);
        bars.truncate(end);

        let keep = (days.max(0) as usize).min(bars.len());
        Ok(bars.split_off(bars.len() - keep))
    }

    fn last_price(&self, ticker: &str) -> Result<f64, SieveError> {
        let bars = self.read_all_bars(ticker)?;
        bars.last()
            .map(|b| b.close)
            .ok_or_else(|| SieveError::NoData {
                ticker: ticker.to_string(),
                reason: "empty history".into(),
            })
    }

    fn info(&self, ticker: &str) -> Result<InstrumentInfo, SieveError> {
        self.members
            .get(&ticker.to_uppercase())
            .map(|m| m.info.clone())
            .ok_or_else(|| SieveError::UnknownTicker {
                ticker: ticker.to_string(),
            })
    }

    fn every_tickers(&self) -> Result<Vec<String>, SieveError> {
        Ok(self.members.keys().cloned().collect())
    }

    fn exchange_tickers(&self, exchange: &str) -> Result<Vec<String>, SieveError> {
        Ok(self
            .members
            .iter()
            .filter(|(_, m)| m.exchange == exchange)
            .map(|(t, _)| t.clone())
            .collect())
    }

    fn index_tickers(&self, index: &str) -> Result<Vec<String>, SieveError> {
        Ok(self
            .members
            .iter()
            .filter(|(_, m)| m.index == index)
            .map(|(t, _)| t.clone())
            .collect())
    }

    fn is_exchange(&self, name: &str) -> bool {
        self.members.values().any(|m| m.exchange == name)
    }

    fn is_index(&self, name: &str) -> bool {
        self.members.values().any(|m| m.index == name)
    }

    fn is_ticker(&self, ticker: &str) -> bool {
        self.members.contains_key(&ticker.to_uppercase())
    }
}

fn load_members(base_path: &PathBuf) -> Result<BTreeMap<String, Membership>, SieveError> {
    let path = base_path.join("universe.csv");
    let content = std::fs::read_to_string(&path).map_err(|e| SieveError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut members = BTreeMap::new();

    for result in rdr.records() {
        let record = result.map_err(|e| SieveError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let get = |i: usize| record.get(i).unwrap_or("").to_string();
        let ticker = get(0).to_uppercase();
        if ticker.is_empty() {
            continue;
        }
        let beta: f64 = record
            .get(3)
            .and_then(|s| s.parse().ok())
            .unwrap_or(f64::NAN);

        members.insert(
            ticker,
            Membership {
                info: InstrumentInfo {
                    name: get(1),
                    sector: get(2),
                    beta,
                },
                exchange: get(4).to_uppercase(),
                index: get(5).to_uppercase(),
            },
        );
    }

    Ok(members)
}
