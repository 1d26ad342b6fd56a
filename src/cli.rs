//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::cache_adapter::FileCacheAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::aggregate::analyze_results;
use crate::domain::error::SieveError;
use crate::domain::screen::screen_names;
use crate::domain::screener::{RunPhase, Screener, ScreenerConfig, Sentiment};
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "marketsieve", about = "Rule-based stock screener")]
pub struct Cli {
    /// Path to the INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a screen against a universe
    Screen {
        /// Universe key: EVERY, an exchange, an index, or a ticker
        universe: String,
        /// Screen name (without the .screen suffix)
        screen: String,
        #[arg(long, default_value_t = 365)]
        days: i64,
        /// Ignore any cached results
        #[arg(long)]
        no_cache: bool,
        /// Do not persist the results
        #[arg(long)]
        no_save: bool,
        /// Rows of the ranked valids to print
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Replay a screen against a shifted window and validate the direction
    Backtest {
        universe: String,
        screen: String,
        #[arg(long, default_value_t = 365)]
        days: i64,
        /// Days to shift the evaluation window into the past
        #[arg(long, default_value_t = 30)]
        days_back: i64,
        /// Expect prices to fall instead of rise
        #[arg(long)]
        bearish: bool,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Merge cached results across screens for a universe
    Analyze { universe: String },
    /// List the available screens
    ListScreens,
}

struct Settings {
    data_dir: PathBuf,
    screen_dir: PathBuf,
    cache_dir: PathBuf,
    cache_today_only: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    let settings = match load_settings(cli.config.as_ref()) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match cli.command {
        Command::Screen {
            universe,
            screen,
            days,
            no_cache,
            no_save,
            top,
        } => run_screen(&settings, &universe, &screen, days, !no_cache, !no_save, top),
        Command::Backtest {
            universe,
            screen,
            days,
            days_back,
            bearish,
            top,
        } => run_backtest(&settings, &universe, &screen, days, days_back, bearish, top),
        Command::Analyze { universe } => run_analyze(&settings, &universe),
        Command::ListScreens => run_list_screens(&settings),
    }
}

fn load_settings(config_path: Option<&PathBuf>) -> Result<Settings, ExitCode> {
    let mut settings = Settings {
        data_dir: PathBuf::from("./data"),
        screen_dir: PathBuf::from("./screens"),
        cache_dir: PathBuf::from("./cache"),
        cache_today_only: true,
    };

    if let Some(path) = config_path {
        let adapter = FileConfigAdapter::from_file(path).map_err(|e| {
            let err = SieveError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            };
            eprintln!("error: {err}");
            ExitCode::from(&err)
        })?;

        if let Some(dir) = adapter.get_string("data", "dir") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = adapter.get_string("screens", "dir") {
            settings.screen_dir = PathBuf::from(dir);
        }
        if let Some(dir) = adapter.get_string("cache", "dir") {
            settings.cache_dir = PathBuf::from(dir);
        }
        settings.cache_today_only = adapter.get_bool("cache", "today_only", true);
    }

    Ok(settings)
}

fn open_adapters(settings: &Settings) -> Result<(Arc<CsvAdapter>, FileCacheAdapter), ExitCode> {
    let port = CsvAdapter::new(settings.data_dir.clone()).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    let cache = FileCacheAdapter::new(&settings.cache_dir).map_err(|e| {
        let err: SieveError = e.into();
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })?;
    Ok((Arc::new(port), cache))
}

fn build_screener(
    settings: &Settings,
    universe: &str,
    screen: &str,
    days: i64,
    backtest_days: i64,
) -> Result<Screener, ExitCode> {
    let (port, cache) = open_adapters(settings)?;
    let mut cfg = ScreenerConfig::new(universe, screen, settings.screen_dir.clone());
    cfg.days = days;
    cfg.backtest_days = backtest_days;
    cfg.cache_today_only = settings.cache_today_only;

    Screener::new(port, cache, cfg).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Start the run and follow the shared progress counters until it settles.
fn follow_run(screener: &Screener, use_cache: bool, save: bool) -> RunPhase {
    let handle = screener.run(use_cache, save);
    let progress = screener.progress();

    loop {
        match progress.phase() {
            RunPhase::Running | RunPhase::Pending => {
                eprint!(
                    "\r{}/{} screened, {} passed  [{}]        ",
                    progress.completed(),
                    progress.total(),
                    progress.succeeded(),
                    progress.current_instrument()
                );
                std::thread::sleep(Duration::from_millis(200));
            }
            _ => break,
        }
    }
    eprintln!();

    handle.wait()
}

fn run_screen(
    settings: &Settings,
    universe: &str,
    screen: &str,
    days: i64,
    use_cache: bool,
    save: bool,
    top: usize,
) -> ExitCode {
    let screener = match build_screener(settings, universe, screen, days, 0) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match follow_run(&screener, use_cache, save) {
        RunPhase::Done => {}
        phase => {
            eprintln!("error: {phase}");
            return ExitCode::FAILURE;
        }
    }

    let valids = screener.valids();
    if screener.cache_used() {
        eprintln!("(cached results)");
    }
    println!(
        "{} of {} instruments pass {}",
        valids.len(),
        screener.progress().total(),
        screen
    );

    let mut summary = screener.summary();
    summary.rows.truncate(top);
    print!("{summary}");

    ExitCode::SUCCESS
}

fn run_backtest(
    settings: &Settings,
    universe: &str,
    screen: &str,
    days: i64,
    days_back: i64,
    bearish: bool,
    top: usize,
) -> ExitCode {
    let screener = match build_screener(settings, universe, screen, days, days_back) {
        Ok(s) => s,
        Err(code) => return code,
    };

    // A cached record reflects an untruncated window; never reuse it here.
    match follow_run(&screener, false, false) {
        RunPhase::Done => {}
        phase => {
            eprintln!("error: {phase}");
            return ExitCode::FAILURE;
        }
    }

    let sentiment = if bearish {
        Sentiment::Bearish
    } else {
        Sentiment::Bullish
    };
    screener.apply_backtest(sentiment);

    let valids = screener.valids();
    let hits = valids.iter().filter(|r| r.backtest_success).count();
    println!(
        "{} of {} valid results moved as predicted ({} days back, {:?})",
        hits,
        valids.len(),
        days_back,
        sentiment
    );

    let mut summary = screener.summary();
    summary.rows.truncate(top);
    print!("{summary}");

    ExitCode::SUCCESS
}

fn run_analyze(settings: &Settings, universe: &str) -> ExitCode {
    let (port, cache) = match open_adapters(settings) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    match analyze_results(port, &cache, &settings.screen_dir, universe) {
        Ok((summary, multiples)) => {
            if summary.is_empty() {
                println!("no aggregatable results for {universe}");
            } else {
                println!("all cached screens for {universe}:");
                print!("{summary}");
                if !multiples.is_empty() {
                    println!("\nvalid in multiple screens:");
                    print!("{multiples}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn run_list_screens(settings: &Settings) -> ExitCode {
    for name in screen_names(&settings.screen_dir) {
        println!("{name}");
    }
    ExitCode::SUCCESS
}
