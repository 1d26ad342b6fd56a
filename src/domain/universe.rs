//! Universe membership resolution.
//!
//! A universe key names either the whole store (`EVERY`), an exchange, an
//! index, or a single ticker. Membership is resolved once, at screener
//! construction, into an immutable snapshot; nothing re-queries the store
//! mid-run.

use crate::domain::error::SieveError;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniverseKind {
    Every,
    Exchange,
    Index,
    Symbol,
}

#[derive(Debug, Clone)]
pub struct Universe {
    pub key: String,
    pub kind: UniverseKind,
    pub tickers: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.tickers.len()
    }

    /// Resolve `key` against the store. Unknown keys are a construction
    /// error, not a run-time state.
    pub fn resolve(port: &dyn DataPort, key: &str) -> Result<Universe, SieveError> {
        if key.trim().is_empty() {
            return Err(SieveError::EmptyUniverse);
        }
        let key = key.to_uppercase();

        let (kind, tickers) = if key == "EVERY" {
            (UniverseKind::Every, port.every_tickers()?)
        } else if port.is_exchange(&key) {
            (UniverseKind::Exchange, port.exchange_tickers(&key)?)
        } else if port.is_index(&key) {
            (UniverseKind::Index, port.index_tickers(&key)?)
        } else if port.is_ticker(&key) {
            (UniverseKind::Symbol, vec![key.clone()])
        } else {
            return Err(SieveError::UnknownUniverse { universe: key });
        };

        Ok(Universe { key, kind, tickers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentInfo;
    use crate::domain::ohlcv::Bar;

    struct StubPort {
        exchanges: Vec<&'static str>,
        indexes: Vec<&'static str>,
        tickers: Vec<&'static str>,
    }

    impl DataPort for StubPort {
        fn history(&self, _: &str, _: i64, _: i64) -> Result<Vec<Bar>, SieveError> {
            Ok(vec![])
        }

        fn last_price(&self, _: &str) -> Result<f64, SieveError> {
            Ok(0.0)
        }

        fn info(&self, _: &str) -> Result<InstrumentInfo, SieveError> {
            Ok(InstrumentInfo::default())
        }

        fn every_tickers(&self) -> Result<Vec<String>, SieveError> {
            Ok(self.tickers.iter().map(|t| t.to_string()).collect())
        }

        fn exchange_tickers(&self, _: &str) -> Result<Vec<String>, SieveError> {
            Ok(self.tickers.iter().map(|t| t.to_string()).collect())
        }

        fn index_tickers(&self, _: &str) -> Result<Vec<String>, SieveError> {
            Ok(self.tickers[..1].iter().map(|t| t.to_string()).collect())
        }

        fn is_exchange(&self, name: &str) -> bool {
            self.exchanges.contains(&name)
        }

        fn is_index(&self, name: &str) -> bool {
            self.indexes.contains(&name)
        }

        fn is_ticker(&self, ticker: &str) -> bool {
            self.tickers.contains(&ticker)
        }
    }

    fn stub() -> StubPort {
        StubPort {
            exchanges: vec!["NYSE"],
            indexes: vec!["SP500"],
            tickers: vec!["AAA", "BBB", "CCC"],
        }
    }

    #[test]
    fn every_resolves_all() {
        let universe = Universe::resolve(&stub(), "every").unwrap();
        assert_eq!(universe.kind, UniverseKind::Every);
        assert_eq!(universe.count(), 3);
    }

    #[test]
    fn exchange_takes_priority() {
        let universe = Universe::resolve(&stub(), "nyse").unwrap();
        assert_eq!(universe.kind, UniverseKind::Exchange);
        assert_eq!(universe.key, "NYSE");
    }

    #[test]
    fn index_resolves() {
        let universe = Universe::resolve(&stub(), "SP500").unwrap();
        assert_eq!(universe.kind, UniverseKind::Index);
        assert_eq!(universe.count(), 1);
    }

    #[test]
    fn single_ticker_resolves() {
        let universe = Universe::resolve(&stub(), "aaa").unwrap();
        assert_eq!(universe.kind, UniverseKind::Symbol);
        assert_eq!(universe.tickers, vec!["AAA"]);
    }

    #[test]
    fn unknown_key_is_error() {
        assert!(matches!(
            Universe::resolve(&stub(), "ZZZ"),
            Err(SieveError::UnknownUniverse { universe }) if universe == "ZZZ"
        ));
    }

    #[test]
    fn empty_key_is_error() {
        assert!(matches!(
            Universe::resolve(&stub(), "  "),
            Err(SieveError::EmptyUniverse)
        ));
    }
}
