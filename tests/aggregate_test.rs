//! Cross-screen aggregation over real cache records written by prior runs.

mod common;

use common::*;
use chrono::NaiveDate;
use marketsieve::adapters::cache_adapter::{CacheRecord, FileCacheAdapter};
use marketsieve::domain::aggregate::analyze_results;
use marketsieve::domain::screener::{RunPhase, Screener, ScreenerConfig};
use std::sync::Arc;
use tempfile::TempDir;

const FLAT_SCREEN: &str = r#"[
  {
    "note": "close pinned at 100",
    "base": {"technical": "close"},
    "criteria": {"technical": "value", "conditional": "eq", "value": 100.0}
  }
]"#;

const FLOOR_SCREEN: &str = r#"[
  {
    "note": "close above 50",
    "base": {"technical": "close"},
    "criteria": {"technical": "value", "conditional": "gt", "value": 50.0}
  }
]"#;

fn screen_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_screen(dir.path(), "init", PASSING_PRELUDE);
    write_screen(dir.path(), "flat", FLAT_SCREEN);
    write_screen(dir.path(), "floor", FLOOR_SCREEN);
    dir
}

fn flat_port() -> MockDataPort {
    MockDataPort::new()
        .with_bars("AAA", flat_series("AAA", 45, 100.0))
        .with_bars("BBB", flat_series("BBB", 45, 100.0))
        .with_info("AAA", "Aardvark Corp", "Tech", 1.1)
        .with_info("BBB", "Badger Corp", "Mining", 0.9)
}

fn run_and_save(screens: &TempDir, cache_dir: &TempDir, screen: &str) {
    let cache = FileCacheAdapter::new(cache_dir.path()).unwrap();
    let cfg = ScreenerConfig::new("EVERY", screen, screens.path());
    let screener = Screener::new(Arc::new(flat_port()), cache, cfg).unwrap();
    assert_eq!(screener.run(false, true).wait(), RunPhase::Done);
}

#[test]
fn merges_same_day_records_across_screens() {
    let screens = screen_dir();
    let cache_dir = TempDir::new().unwrap();
    run_and_save(&screens, &cache_dir, "flat");
    run_and_save(&screens, &cache_dir, "floor");

    let cache = FileCacheAdapter::new(cache_dir.path()).unwrap();
    let (summary, multiples) =
        analyze_results(Arc::new(flat_port()), &cache, screens.path(), "EVERY").unwrap();

    // Two screens, two valid instruments each.
    assert_eq!(summary.rows.len(), 4);
    assert_eq!(
        summary.columns,
        vec!["ticker", "score", "company", "sector", "screen", "price_current"]
    );

    // Both tickers pass both screens and land in the multiples table once.
    assert_eq!(multiples.rows.len(), 2);
    let mut tickers: Vec<&str> = multiples.rows.iter().map(|r| r[0].as_str()).collect();
    tickers.sort();
    assert_eq!(tickers, vec!["AAA", "BBB"]);
    for row in &multiples.rows {
        let mut screens: Vec<&str> = row[4].split(',').collect();
        screens.sort();
        assert_eq!(screens, vec!["flat", "floor"]);
    }
}

#[test]
fn mixed_dates_yield_empty_tables() {
    let screens = screen_dir();
    let cache_dir = TempDir::new().unwrap();
    run_and_save(&screens, &cache_dir, "flat");

    // A second screen cached on a different day poisons the merge.
    let stale = CacheRecord {
        universe: "every".into(),
        screen: "floor".into(),
        date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        results: vec![],
    };
    std::fs::write(
        cache_dir.path().join("2020-01-01_scr_every-floor.json"),
        serde_json::to_string(&stale).unwrap(),
    )
    .unwrap();

    let cache = FileCacheAdapter::new(cache_dir.path()).unwrap();
    let (summary, multiples) =
        analyze_results(Arc::new(flat_port()), &cache, screens.path(), "EVERY").unwrap();
    assert!(summary.is_empty());
    assert!(multiples.is_empty());
}

#[test]
fn empty_cache_yields_empty_tables() {
    let screens = screen_dir();
    let cache_dir = TempDir::new().unwrap();
    let cache = FileCacheAdapter::new(cache_dir.path()).unwrap();

    let (summary, multiples) =
        analyze_results(Arc::new(flat_port()), &cache, screens.path(), "EVERY").unwrap();
    assert!(summary.is_empty());
    assert!(multiples.is_empty());
}
