//! File-backed cache of screen results.
//!
//! One JSON record per (universe, screen) run, named
//! `{date}_scr_{universe}-{screen}.json` with lowercased keys. The `scr`
//! cache-type tag keeps screener records distinguishable from other cache
//! consumers sharing the store. Writes are atomic (temp file + rename) so a
//! concurrent reader never observes a torn record. I/O and parse failures
//! are logged and reported as misses; they never surface to callers.

use crate::domain::result::ScreenResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CACHE_TYPE: &str = "scr";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub universe: String,
    pub screen: String,
    pub date: NaiveDate,
    pub results: Vec<ScreenResult>,
}

#[derive(Debug, Clone)]
pub struct FileCacheAdapter {
    dir: PathBuf,
}

impl FileCacheAdapter {
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key(universe: &str, screen: &str) -> String {
        format!("{}-{}", universe.to_lowercase(), screen.to_lowercase())
    }

    fn record_path(&self, date: NaiveDate, universe: &str, screen: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_{}.json",
            date.format(DATE_FORMAT),
            CACHE_TYPE,
            Self::key(universe, screen)
        ))
    }

    /// Dates of the records stored for (universe, screen), newest first.
    fn record_dates(&self, universe: &str, screen: &str) -> Vec<NaiveDate> {
        let key = Self::key(universe, screen);
        let mut dates: Vec<NaiveDate> = self
            .filenames()
            .iter()
            .filter_map(|name| parse_name(name))
            .filter(|(_, record_key)| *record_key == key)
            .map(|(date, _)| date)
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates
    }

    pub fn exists(&self, universe: &str, screen: &str, today_only: bool) -> bool {
        match self.record_dates(universe, screen).first() {
            Some(&date) if today_only => date == today(),
            Some(_) => true,
            None => false,
        }
    }

    /// The newest record for (universe, screen) honoring the `today_only`
    /// policy, or `None` on miss or unreadable record.
    pub fn load(
        &self,
        universe: &str,
        screen: &str,
        today_only: bool,
    ) -> Option<(Vec<ScreenResult>, NaiveDate)> {
        let date = *self.record_dates(universe, screen).first()?;
        if today_only && date != today() {
            return None;
        }

        let path = self.record_path(date, universe, screen);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!("cache read failed for {}: {}", path.display(), err);
                return None;
            }
        };
        match serde_json::from_str::<CacheRecord>(&content) {
            Ok(record) => Some((record.results, record.date)),
            Err(err) => {
                tracing::warn!("cache record {} unreadable: {}", path.display(), err);
                None
            }
        }
    }

    /// Write today's record for (universe, screen). Older records for the
    /// same key are removed afterwards, so exactly one record per key
    /// survives. Failures are logged; the run result stands either way.
    pub fn dump(&self, results: &[ScreenResult], universe: &str, screen: &str) {
        let date = today();
        let record = CacheRecord {
            universe: universe.to_lowercase(),
            screen: screen.to_lowercase(),
            date,
            results: results.to_vec(),
        };

        let path = self.record_path(date, universe, screen);
        if let Err(err) = self.write_atomic(&path, &record) {
            tracing::warn!("cache dump failed for {}: {}", path.display(), err);
            return;
        }

        for old in self.record_dates(universe, screen) {
            if old != date {
                let stale = self.record_path(old, universe, screen);
                if let Err(err) = std::fs::remove_file(&stale) {
                    tracing::warn!("could not prune {}: {}", stale.display(), err);
                }
            }
        }
    }

    /// All (screen, date) pairs cached for `universe`.
    pub fn scan(&self, universe: &str) -> Vec<(String, NaiveDate)> {
        let universe = universe.to_lowercase();
        self.filenames()
            .iter()
            .filter_map(|name| parse_name(name))
            .filter_map(|(date, key)| {
                let (record_universe, screen) = key.split_once('-')?;
                (record_universe == universe).then(|| (screen.to_string(), date))
            })
            .collect()
    }

    fn write_atomic(&self, path: &Path, record: &CacheRecord) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }

    fn filenames(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .collect()
    }
}

/// `{date}_{type}_{universe}-{screen}.json` → (date, key); records of other
/// cache types are skipped.
fn parse_name(name: &str) -> Option<(NaiveDate, String)> {
    let stem = name.strip_suffix(".json")?;
    let mut parts = stem.splitn(3, '_');
    let date = NaiveDate::parse_from_str(parts.next()?, DATE_FORMAT).ok()?;
    if parts.next()? != CACHE_TYPE {
        return None;
    }
    Some((date, parts.next()?.to_string()))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_result() -> ScreenResult {
        ScreenResult {
            ticker: "AAA".into(),
            name: "AAA Corp".into(),
            sector: "Tech".into(),
            screen: "bulltrend".into(),
            outcomes: vec![],
            price_current: 100.0,
            price_last: 0.0,
            backtest_success: false,
            error: None,
        }
    }

    #[test]
    fn dump_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path()).unwrap();

        cache.dump(&[sample_result()], "SP500", "Bulltrend");
        assert!(cache.exists("sp500", "bulltrend", true));

        let (results, date) = cache.load("SP500", "bulltrend", true).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ticker, "AAA");
        assert_eq!(date, today());
    }

    #[test]
    fn miss_on_unknown_key() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path()).unwrap();
        assert!(!cache.exists("sp500", "bulltrend", false));
        assert!(cache.load("sp500", "bulltrend", false).is_none());
    }

    #[test]
    fn today_only_rejects_stale_record() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path()).unwrap();

        let stale = CacheRecord {
            universe: "sp500".into(),
            screen: "bulltrend".into(),
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            results: vec![sample_result()],
        };
        let path = dir.path().join("2020-01-01_scr_sp500-bulltrend.json");
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        assert!(!cache.exists("sp500", "bulltrend", true));
        assert!(cache.exists("sp500", "bulltrend", false));
        assert!(cache.load("sp500", "bulltrend", true).is_none());
        assert!(cache.load("sp500", "bulltrend", false).is_some());
    }

    #[test]
    fn dump_prunes_older_records_for_same_key() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path()).unwrap();

        let path = dir.path().join("2020-01-01_scr_sp500-bulltrend.json");
        let stale = CacheRecord {
            universe: "sp500".into(),
            screen: "bulltrend".into(),
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            results: vec![],
        };
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        cache.dump(&[sample_result()], "sp500", "bulltrend");
        assert!(!path.exists());
        assert_eq!(cache.record_dates("sp500", "bulltrend").len(), 1);
    }

    #[test]
    fn corrupt_record_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path()).unwrap();
        let name = format!("{}_scr_sp500-bulltrend.json", today().format("%Y-%m-%d"));
        std::fs::write(dir.path().join(name), "{not json").unwrap();
        assert!(cache.load("sp500", "bulltrend", true).is_none());
    }

    #[test]
    fn scan_matches_universe_only() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path()).unwrap();
        cache.dump(&[], "sp500", "bulltrend");
        cache.dump(&[], "sp500", "value");
        cache.dump(&[], "nasdaq", "bulltrend");

        let mut screens: Vec<String> = cache.scan("SP500").into_iter().map(|(s, _)| s).collect();
        screens.sort();
        assert_eq!(screens, vec!["bulltrend", "value"]);
    }

    #[test]
    fn scan_ignores_other_cache_types() {
        let dir = TempDir::new().unwrap();
        let cache = FileCacheAdapter::new(dir.path()).unwrap();
        let name = format!("{}_opt_sp500-straddle.json", today().format("%Y-%m-%d"));
        std::fs::write(dir.path().join(name), "[]").unwrap();
        assert!(cache.scan("sp500").is_empty());
    }
}
