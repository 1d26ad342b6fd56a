//! Cross-screen aggregation of cached results.
//!
//! Merges every cached screen run for a universe into one ranked view, but
//! only when all the records carry the same date stamp: mixing runs from
//! different days would compare scores computed against different history,
//! so a mixed-date (or empty) set yields empty tables rather than a guess.

use crate::adapters::cache_adapter::FileCacheAdapter;
use crate::domain::error::SieveError;
use crate::domain::report::{self, Table};
use crate::domain::result::ScreenResult;
use crate::domain::screener::{Screener, ScreenerConfig};
use crate::ports::data_port::DataPort;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Merge all cached screens for `universe` into a flat summary plus the
/// "multiples" table of instruments validated by more than one screen.
pub fn analyze_results(
    port: Arc<dyn DataPort>,
    cache: &FileCacheAdapter,
    screen_dir: &Path,
    universe: &str,
) -> Result<(Table, Table), SieveError> {
    let records = cache.scan(universe);
    let dates: BTreeSet<_> = records.iter().map(|(_, date)| *date).collect();
    if dates.len() != 1 {
        tracing::info!(
            "no aggregatable results for {} ({} distinct dates)",
            universe,
            dates.len()
        );
        return Ok((Table::default(), Table::default()));
    }

    let mut results: Vec<ScreenResult> = Vec::new();
    for (screen, _) in &records {
        let mut cfg = ScreenerConfig::new(universe, screen, screen_dir);
        // Date consistency is already established; accept records of any age.
        cfg.cache_today_only = false;

        let screener = Screener::new(Arc::clone(&port), cache.clone(), cfg)?;
        if screener.cache_available() {
            screener.run(true, false).wait();
            results.extend(screener.valids());
        }
    }

    if results.is_empty() {
        tracing::info!("no valid results for {}", universe);
        return Ok((Table::default(), Table::default()));
    }

    results.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    let summary =
        report::summarize(&results).without_columns(&["valid", "price_last", "backtest"]);
    let multiples = report::group_multiples(&results);
    Ok((summary, multiples))
}
