//! circletrack CLI: single evaluations, tracking passes and batch runs.
//!
//! Commands:
//! - `evaluate`: classify one instrument on one timeframe
//! - `daily`: daily pass for one instrument given yesterday's label
//! - `weekly`: weekly pass for one instrument
//! - `history`: replay every symbol as of a past date into a result table
//! - `schedule`: run the daily/weekly passes over a date range

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use circletrack_core::archive::CsvArchiveStore;
use circletrack_core::calendar::{HolidayCalendar, TradingCalendar, WeekdayCalendar};
use circletrack_core::data::CsvBarSource;
use circletrack_core::domain::{EvaluationResult, State, Timeframe};
use circletrack_core::session::ArchivePolicy;
use circletrack_core::Evaluator;
use circletrack_runner::symbols::codes;
use circletrack_runner::{
    load_symbols, run_history, stage_resources, BatchRunner, ResourceLoader, Schedule, Tracker,
    TrackerConfig,
};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "circletrack", about = "circletrack: circle breakout tracking for daily and weekly bars")]
struct Cli {
    /// Path to the TOML config. Missing file means defaults.
    #[arg(long, global = true, default_value = "circletrack.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one instrument on one timeframe.
    Evaluate {
        code: String,

        /// Timeframe: d or w.
        #[arg(long, default_value = "d")]
        timeframe: Timeframe,

        /// As-of date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Never rewrite the archive.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Daily pass for one instrument.
    Daily {
        code: String,

        /// Yesterday's label, e.g. Rise or Drop.
        #[arg(long, default_value = "Rise")]
        pre_state: State,

        /// As-of date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Weekly pass for one instrument.
    Weekly {
        code: String,

        /// As-of date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Replay every listed symbol as of a past date.
    History {
        /// Replay date (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,

        /// Freeze the data directory into per-date resources first.
        #[arg(long, default_value_t = false)]
        stage: bool,
    },
    /// Run the daily and weekly passes for every trading day in a range.
    Schedule {
        /// First day (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day (YYYY-MM-DD). Defaults to `start`.
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("circletrack=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let cli = Cli::parse();
    let config = TrackerConfig::load(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;

    match cli.command {
        Commands::Evaluate {
            code,
            timeframe,
            date,
            dry_run,
        } => run_evaluate(&config, &code, timeframe, date.unwrap_or_else(today), dry_run),
        Commands::Daily {
            code,
            pre_state,
            date,
        } => run_daily(&config, &code, pre_state, date.unwrap_or_else(today)),
        Commands::Weekly { code, date } => run_weekly(&config, &code, date.unwrap_or_else(today)),
        Commands::History { date, stage } => run_history_cmd(&config, date, stage),
        Commands::Schedule { start, end } => {
            let start = start.unwrap_or_else(today);
            run_schedule(&config, start, end.unwrap_or(start))
        }
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn load_calendar(config: &TrackerConfig) -> Result<Box<dyn TradingCalendar>> {
    match &config.files.calendar {
        Some(path) => {
            let calendar = HolidayCalendar::from_file(path)
                .with_context(|| format!("load calendar {}", path.display()))?;
            info!(overrides = calendar.len(), path = %path.display(), "calendar loaded");
            Ok(Box::new(calendar))
        }
        None => Ok(Box::new(WeekdayCalendar)),
    }
}

fn load_codes(config: &TrackerConfig) -> Result<Vec<String>> {
    let path = &config.files.symbols;
    let symbols =
        load_symbols(path).with_context(|| format!("load symbol list {}", path.display()))?;
    info!(symbols = symbols.len(), "symbol list loaded");
    Ok(codes(&symbols))
}

fn print_result(result: &EvaluationResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn run_evaluate(
    config: &TrackerConfig,
    code: &str,
    timeframe: Timeframe,
    date: NaiveDate,
    dry_run: bool,
) -> Result<()> {
    let source = CsvBarSource::new(&config.dirs.data);
    let store = CsvArchiveStore::new(&config.dirs.archive);
    let policy = if dry_run {
        ArchivePolicy::Never
    } else {
        config.archive_policy()?
    };

    let result = Evaluator::new(&source, &store)
        .with_policy(policy)
        .evaluate(code, timeframe, date);
    print_result(&result)
}

fn run_daily(config: &TrackerConfig, code: &str, pre_state: State, date: NaiveDate) -> Result<()> {
    let source = CsvBarSource::new(&config.dirs.data);
    let store = CsvArchiveStore::new(&config.dirs.archive);
    let calendar = load_calendar(config)?;
    let tracker =
        Tracker::new(&source, &store, calendar.as_ref()).with_policy(config.archive_policy()?);

    print_result(&tracker.daily(code, pre_state, date))
}

fn run_weekly(config: &TrackerConfig, code: &str, date: NaiveDate) -> Result<()> {
    let source = CsvBarSource::new(&config.dirs.data);
    let store = CsvArchiveStore::new(&config.dirs.archive);
    let calendar = load_calendar(config)?;
    let tracker =
        Tracker::new(&source, &store, calendar.as_ref()).with_policy(config.archive_policy()?);

    print_result(&tracker.weekly(code, date))
}

fn run_history_cmd(config: &TrackerConfig, date: NaiveDate, stage: bool) -> Result<()> {
    let source = CsvBarSource::new(&config.dirs.data);
    let store = CsvArchiveStore::new(&config.dirs.archive);
    let calendar = load_calendar(config)?;
    let loader = ResourceLoader::new(&config.dirs.resource);
    let codes = load_codes(config)?;
    let batch = BatchRunner::new(config.batch.workers)?;

    if stage && stage_resources(&loader, &source, &codes, date) == 0 {
        bail!("no resources could be staged for {date}");
    }

    let tracker = Tracker::new(&source, &store, calendar.as_ref()).with_resources(&loader);
    match run_history(&tracker, &batch, calendar.as_ref(), &codes, date, &config.dirs.result)? {
        Some(path) => println!("Result table: {}", path.display()),
        None => println!("No reportable rows for {date}"),
    }
    Ok(())
}

fn run_schedule(config: &TrackerConfig, start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        bail!("--end {end} is before --start {start}");
    }

    let source = CsvBarSource::new(&config.dirs.data);
    let store = CsvArchiveStore::new(&config.dirs.archive);
    let calendar = load_calendar(config)?;
    let codes = load_codes(config)?;
    let batch = BatchRunner::new(config.batch.workers)?;
    let tracker =
        Tracker::new(&source, &store, calendar.as_ref()).with_policy(config.archive_policy()?);

    let schedule = Schedule::new(
        &tracker,
        &batch,
        calendar.as_ref(),
        &config.dirs.result,
        codes,
    );
    let mut failed = 0;
    for report in schedule.run_range(start, end) {
        let Some(date) = report.date else { continue };
        for path in report.daily.iter().chain(report.weekly.iter()) {
            println!("{date}: {}", path.display());
        }
        for failure in &report.failures {
            eprintln!("{date}: {failure}");
        }
        failed += usize::from(!report.is_ok());
    }
    if failed > 0 {
        bail!("{failed} scheduled day(s) had failing passes");
    }
    Ok(())
}
