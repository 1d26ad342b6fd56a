//! Screen orchestration: universe resolution, cache probe, parallel clause
//! evaluation, ranking, and persistence.
//!
//! `run` is fire-and-forget: it launches a fixed-size worker pool and
//! returns a [`RunHandle`] immediately. Callers either block on
//! [`RunHandle::wait`] or poll the shared [`RunProgress`] counters (the
//! progress-bar consumer does the latter). Results accumulate per shard and
//! are merged by a coordinator thread once every shard finishes, so workers
//! never contend on a shared results list.
//!
//! Schema validation is a pre-flight pass: a malformed clause fails the run
//! before any worker starts. Per-instrument data errors do not poison the
//! batch; they mark that instrument's result invalid with an error note.

use crate::adapters::cache_adapter::FileCacheAdapter;
use crate::domain::clause::Clause;
use crate::domain::error::SieveError;
use crate::domain::instrument::Instrument;
use crate::domain::interpreter;
use crate::domain::report::{self, Table};
use crate::domain::result::ScreenResult;
use crate::domain::screen::Screen;
use crate::domain::universe::Universe;
use crate::ports::data_port::DataPort;
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

pub const MIN_DAYS: i64 = 30;
const MAX_CONCURRENCY: usize = 10;

#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    pub universe: String,
    pub screen: String,
    pub days: i64,
    pub backtest_days: i64,
    pub screen_dir: PathBuf,
    pub cache_today_only: bool,
}

impl ScreenerConfig {
    pub fn new(universe: &str, screen: &str, screen_dir: impl Into<PathBuf>) -> Self {
        Self {
            universe: universe.to_string(),
            screen: screen.to_string(),
            days: 365,
            backtest_days: 0,
            screen_dir: screen_dir.into(),
            cache_today_only: true,
        }
    }
}

/// Predicted price direction of a screen, used by the backtest post-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    Pending,
    Running,
    Failed(String),
    Done,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Pending => write!(f, "pending"),
            RunPhase::Running => write!(f, "running"),
            RunPhase::Failed(msg) => write!(f, "{msg}"),
            RunPhase::Done => write!(f, "done"),
        }
    }
}

/// Shared run state observed by progress consumers. Counters are plain
/// atomics; the phase and current-ticker strings are mutex-guarded.
#[derive(Debug, Default)]
pub struct RunProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
    succeeded: AtomicUsize,
    phase: Mutex<Option<RunPhase>>,
    current: Mutex<String>,
    cancelled: AtomicBool,
}

impl RunProgress {
    pub fn total(&self) -> usize {
        self.total.load(AtomicOrdering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(AtomicOrdering::Relaxed)
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(AtomicOrdering::Relaxed)
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(RunPhase::Pending)
    }

    pub fn current_instrument(&self) -> String {
        self.current.lock().unwrap().clone()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Relaxed)
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.lock().unwrap() = Some(phase);
    }

    fn set_current(&self, ticker: &str) {
        *self.current.lock().unwrap() = ticker.to_string();
    }
}

/// Completion signal for one `run` invocation.
pub struct RunHandle {
    done: mpsc::Receiver<()>,
    progress: Arc<RunProgress>,
}

impl RunHandle {
    /// Block until the run finishes; returns the final phase.
    pub fn wait(self) -> RunPhase {
        // A dropped sender also means the run is over.
        let _ = self.done.recv();
        self.progress.phase()
    }
}

#[derive(Debug, Default)]
struct RunOutput {
    results: Vec<ScreenResult>,
    valids: Vec<ScreenResult>,
    summary: Table,
}

pub struct Screener {
    universe: Universe,
    screen: Screen,
    days: i64,
    backtest_days: i64,
    port: Arc<dyn DataPort>,
    cache: FileCacheAdapter,
    cache_today_only: bool,
    cache_available: bool,
    cache_used: AtomicBool,
    progress: Arc<RunProgress>,
    output: Arc<Mutex<RunOutput>>,
}

impl Screener {
    /// Validate keys and day counts, resolve the universe snapshot, load the
    /// screen (prelude included), and probe the cache. A cache hit pre-loads
    /// the prior results without starting any worker.
    pub fn new(
        port: Arc<dyn DataPort>,
        cache: FileCacheAdapter,
        cfg: ScreenerConfig,
    ) -> Result<Screener, SieveError> {
        if cfg.screen.trim().is_empty() {
            return Err(SieveError::EmptyScreen);
        }
        if cfg.days < MIN_DAYS {
            return Err(SieveError::InvalidDays { days: cfg.days });
        }
        if cfg.backtest_days < 0 {
            return Err(SieveError::InvalidBacktestDays {
                days: cfg.backtest_days,
            });
        }

        let universe = Universe::resolve(port.as_ref(), &cfg.universe)?;
        let screen = Screen::load(&cfg.screen_dir, &cfg.screen)?;

        let output = Arc::new(Mutex::new(RunOutput::default()));
        let cache_available =
            match cache.load(&universe.key, &screen.name, cfg.cache_today_only) {
                Some((results, date)) => {
                    tracing::info!(
                        "cached results available for {}-{} ({})",
                        universe.key,
                        screen.name,
                        date
                    );
                    output.lock().unwrap().results = results;
                    true
                }
                None => false,
            };

        Ok(Screener {
            universe,
            screen,
            days: cfg.days,
            backtest_days: cfg.backtest_days,
            port,
            cache,
            cache_today_only: cfg.cache_today_only,
            cache_available,
            cache_used: AtomicBool::new(false),
            progress: Arc::new(RunProgress::default()),
            output,
        })
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn screen_name(&self) -> &str {
        &self.screen.name
    }

    pub fn cache_available(&self) -> bool {
        self.cache_available
    }

    pub fn cache_used(&self) -> bool {
        self.cache_used.load(AtomicOrdering::Relaxed)
    }

    pub fn progress(&self) -> Arc<RunProgress> {
        Arc::clone(&self.progress)
    }

    pub fn results(&self) -> Vec<ScreenResult> {
        self.output.lock().unwrap().results.clone()
    }

    pub fn valids(&self) -> Vec<ScreenResult> {
        self.output.lock().unwrap().valids.clone()
    }

    pub fn summary(&self) -> Table {
        self.output.lock().unwrap().summary.clone()
    }

    pub fn score(&self, ticker: &str) -> Option<f64> {
        let ticker = ticker.to_uppercase();
        self.output
            .lock()
            .unwrap()
            .results
            .iter()
            .find(|r| r.ticker == ticker)
            .map(|r| r.score())
    }

    /// Launch the run and return immediately. `use_cache` reuses a
    /// preloaded cache record; `save` persists the finished run.
    pub fn run(&self, use_cache: bool, save: bool) -> RunHandle {
        let (done_tx, done_rx) = mpsc::channel();
        let handle = RunHandle {
            done: done_rx,
            progress: Arc::clone(&self.progress),
        };

        if use_cache && self.cache_available {
            let mut output = self.output.lock().unwrap();
            let results = output.results.clone();
            output.valids = ranked_valids(&results);
            output.summary = report::summarize(&output.valids);
            self.progress
                .total
                .store(results.len(), AtomicOrdering::Relaxed);
            self.progress
                .completed
                .store(results.len(), AtomicOrdering::Relaxed);
            self.progress
                .succeeded
                .store(output.valids.len(), AtomicOrdering::Relaxed);
            self.progress.set_phase(RunPhase::Done);
            self.cache_used.store(true, AtomicOrdering::Relaxed);
            tracing::info!("using cached results for {}", self.screen.name);
            let _ = done_tx.send(());
            return handle;
        }

        let clauses = match self.screen.compile() {
            Ok(clauses) => Arc::new(clauses),
            Err(err) => {
                return self.fail_early(err.to_string(), done_tx, handle);
            }
        };

        let total = self.universe.count();
        if total == 0 {
            return self.fail_early("no symbols in universe".into(), done_tx, handle);
        }
        if clauses.is_empty() {
            return self.fail_early("empty screen".into(), done_tx, handle);
        }

        self.progress.total.store(total, AtomicOrdering::Relaxed);
        self.progress.completed.store(0, AtomicOrdering::Relaxed);
        self.progress.succeeded.store(0, AtomicOrdering::Relaxed);
        self.progress.set_phase(RunPhase::Running);

        tracing::info!(
            "screening {} symbols from {} (days={}, backtest={})",
            total,
            self.universe.key,
            self.days,
            self.backtest_days
        );

        let mut instruments: Vec<Instrument> = self
            .universe
            .tickers
            .iter()
            .map(|t| Instrument::new(t, self.days, self.backtest_days, Arc::clone(&self.port)))
            .collect();

        // Shuffle so no single shard systematically inherits the instruments
        // with expensive or missing history.
        instruments.shuffle(&mut rand::thread_rng());

        let concurrency = if total > MAX_CONCURRENCY {
            MAX_CONCURRENCY
        } else {
            1
        };
        let shard_size = total.div_ceil(concurrency);

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                return self.fail_early(format!("worker pool: {err}"), done_tx, handle);
            }
        };

        let (shard_tx, shard_rx) = mpsc::channel::<Vec<ScreenResult>>();
        let mut shards = 0usize;
        while !instruments.is_empty() {
            let shard: Vec<Instrument> =
                instruments.drain(..shard_size.min(instruments.len())).collect();
            let clauses = Arc::clone(&clauses);
            let progress = Arc::clone(&self.progress);
            let port = Arc::clone(&self.port);
            let tx = shard_tx.clone();
            let screen_name = self.screen.name.clone();
            let backtest = self.backtest_days > 0;
            shards += 1;

            pool.spawn(move || {
                let mut local = Vec::with_capacity(shard.len());
                for instrument in &shard {
                    if progress.is_cancelled() {
                        break;
                    }
                    progress.set_current(instrument.ticker());

                    let result = evaluate_instrument(
                        instrument,
                        &clauses,
                        port.as_ref(),
                        &screen_name,
                        backtest,
                    );
                    progress.completed.fetch_add(1, AtomicOrdering::Relaxed);
                    if result.valid() {
                        progress.succeeded.fetch_add(1, AtomicOrdering::Relaxed);
                    }
                    local.push(result);
                }
                let _ = tx.send(local);
            });
        }
        drop(shard_tx);

        let progress = Arc::clone(&self.progress);
        let output = Arc::clone(&self.output);
        let cache = self.cache.clone();
        let universe_key = self.universe.key.clone();
        let screen_name = self.screen.name.clone();

        std::thread::spawn(move || {
            // Keep the pool alive until every shard has reported.
            let _pool = pool;
            let mut results = Vec::new();
            for _ in 0..shards {
                match shard_rx.recv() {
                    Ok(mut local) => results.append(&mut local),
                    Err(_) => break,
                }
            }

            if progress.is_cancelled() {
                let mut output = output.lock().unwrap();
                output.results.clear();
                output.valids.clear();
                output.summary = Table::default();
                progress.set_phase(RunPhase::Failed("cancelled".into()));
                let _ = done_tx.send(());
                return;
            }

            let valids = ranked_valids(&results);
            let summary = report::summarize(&valids);
            if save {
                cache.dump(&results, &universe_key, &screen_name);
            }

            {
                let mut output = output.lock().unwrap();
                output.results = results;
                output.valids = valids;
                output.summary = summary;
            }
            progress.set_phase(RunPhase::Done);
            let _ = done_tx.send(());
        });

        handle
    }

    /// Backtest post-pass over the finished run: compare the live price to
    /// the truncated-window boundary price for every valid result.
    pub fn apply_backtest(&self, sentiment: Sentiment) {
        let mut output = self.output.lock().unwrap();
        for result in output.results.iter_mut() {
            if !result.valid() {
                continue;
            }
            match self.port.last_price(&result.ticker) {
                Ok(price) => result.price_current = price,
                Err(err) => {
                    tracing::warn!("no live price for {}: {}", result.ticker, err);
                    continue;
                }
            }
            result.backtest_success = match sentiment {
                Sentiment::Bullish => result.price_current > result.price_last,
                Sentiment::Bearish => result.price_current < result.price_last,
            };
        }
        let results = output.results.clone();
        output.valids = ranked_valids(&results);
        output.summary = report::summarize(&output.valids);
    }

    fn fail_early(&self, reason: String, done_tx: mpsc::Sender<()>, handle: RunHandle) -> RunHandle {
        tracing::error!("screen run failed: {reason}");
        {
            let mut output = self.output.lock().unwrap();
            output.results.clear();
            output.valids.clear();
            output.summary = Table::default();
        }
        self.progress.set_phase(RunPhase::Failed(reason));
        let _ = done_tx.send(());
        handle
    }
}

/// Evaluate every clause against one instrument, in order. A data error
/// from the instrument (not a data warning) is confined to this result.
fn evaluate_instrument(
    instrument: &Instrument,
    clauses: &[Clause],
    port: &dyn DataPort,
    screen_name: &str,
    backtest: bool,
) -> ScreenResult {
    let mut outcomes = Vec::with_capacity(clauses.len());
    let mut error = None;

    for clause in clauses {
        match interpreter::evaluate(instrument, clause) {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                tracing::warn!("{}: {}", instrument.ticker(), err);
                error = Some(err.to_string());
                break;
            }
        }
    }

    let info = instrument.info().clone();
    let price_current = port.last_price(instrument.ticker()).unwrap_or_else(|err| {
        tracing::warn!("no last price for {}: {}", instrument.ticker(), err);
        0.0
    });
    let price_last = if backtest {
        instrument.window_last_price().unwrap_or(0.0)
    } else {
        0.0
    };

    ScreenResult {
        ticker: instrument.ticker().to_string(),
        name: info.name,
        sector: info.sector,
        screen: screen_name.to_string(),
        outcomes,
        price_current,
        price_last,
        backtest_success: false,
        error,
    }
}

/// Valid results ranked by score descending; ties break on ticker so the
/// ordering is reproducible run to run.
fn ranked_valids(results: &[ScreenResult]) -> Vec<ScreenResult> {
    let mut valids: Vec<ScreenResult> = results.iter().filter(|r| r.valid()).cloned().collect();
    valids.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    valids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interpreter::ClauseOutcome;

    fn result(ticker: &str, score: f64, passed: bool) -> ScreenResult {
        ScreenResult {
            ticker: ticker.into(),
            name: String::new(),
            sector: String::new(),
            screen: "s".into(),
            outcomes: vec![ClauseOutcome {
                passed,
                score,
                description: String::new(),
            }],
            price_current: 0.0,
            price_last: 0.0,
            backtest_success: false,
            error: None,
        }
    }

    #[test]
    fn ranked_valids_sorts_by_score_then_ticker() {
        let results = vec![
            result("BBB", 1.0, true),
            result("AAA", 1.0, true),
            result("CCC", 2.0, true),
            result("DDD", 0.0, false),
        ];
        let valids = ranked_valids(&results);
        let tickers: Vec<&str> = valids.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["CCC", "AAA", "BBB"]);
    }

    #[test]
    fn run_phase_display() {
        assert_eq!(RunPhase::Running.to_string(), "running");
        assert_eq!(RunPhase::Done.to_string(), "done");
        assert_eq!(RunPhase::Failed("boom".into()).to_string(), "boom");
    }

    #[test]
    fn progress_defaults_to_pending() {
        let progress = RunProgress::default();
        assert_eq!(progress.phase(), RunPhase::Pending);
        assert_eq!(progress.completed(), 0);
    }
}
