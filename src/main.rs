//! Gym Occupancy Tracker CLI
//!
//! Collects zone occupancy on a fixed cadence and reports hourly averages.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{CommandFactory, Parser};
use gym_occupancy_tracker::{
    collector::ZoneSource,
    config::Config,
    core::{
        AggregationEngine, Clock, CollectionScheduler, LocalClock, ShutdownSignal, SweepSummary,
    },
    export::{export_hourly_averages, export_weekly_summary},
    stats::{create_shared_stats_with_persistence, CollectionStats, SharedCollectionStats},
    store::{SampleStore, SqliteStore},
    HttpZoneSource, VERSION,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const STATS_FILE: &str = "collection_stats.json";

#[derive(Parser)]
#[command(name = "gym-tracker")]
#[command(version = VERSION)]
#[command(about = "Gym zone occupancy collector and hourly aggregator", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Write the effective configuration to the config file
    #[arg(long)]
    init_config: bool,

    /// Show database and collection statistics
    #[arg(long)]
    status: bool,

    /// Run one collection now
    #[arg(long)]
    once: bool,

    /// Aggregate every completed hour that has readings
    #[arg(long)]
    aggregate: bool,

    /// Export hourly averages to CSV
    #[arg(long)]
    export: bool,

    /// Export the weekly day/hour profile to CSV
    #[arg(long)]
    summary: bool,

    /// Collect continuously until Ctrl+C
    #[arg(long)]
    collect: bool,

    /// Print the effective configuration
    #[arg(long)]
    show_config: bool,

    /// First date included in the export (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    start_date: Option<NaiveDate>,

    /// Last date included in the export (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    end_date: Option<NaiveDate>,

    /// Output file for --export
    #[arg(long, short, requires = "export")]
    output: Option<PathBuf>,

    /// Output file for --summary
    #[arg(long, requires = "summary")]
    summary_output: Option<PathBuf>,
}

impl Cli {
    fn has_action(&self) -> bool {
        self.init_config
            || self.status
            || self.once
            || self.aggregate
            || self.export
            || self.summary
            || self.collect
            || self.show_config
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if !cli.has_action() {
        if let Err(e) = Cli::command().print_help() {
            eprintln!("Error printing help: {e}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    exit_code(run(cli))
}

fn exit_code(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = Config::load_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }

    if cli.init_config {
        cmd_init_config(&config, &config_path)?;
    }

    if let Err(e) = config.ensure_directories() {
        warn!("Could not create directories: {e}");
    }

    let clock = LocalClock::from_basis(&config.time_basis)
        .context("configured time basis cannot be resolved")?;

    let needs_store =
        cli.status || cli.once || cli.aggregate || cli.export || cli.summary || cli.collect;
    let store = if needs_store {
        Some(
            SqliteStore::open(&config.database_path)
                .with_context(|| format!("opening database {}", config.database_path.display()))?,
        )
    } else {
        None
    };

    if let Some(store) = &store {
        if cli.status {
            cmd_status(&config, store)?;
        }
        if cli.once {
            cmd_once(&config, store, clock)?;
        }
        if cli.aggregate {
            cmd_aggregate(&config, store, clock)?;
        }
        if cli.export {
            let path = export_hourly_averages(
                store,
                &config.export_path,
                cli.output.clone(),
                cli.start_date,
                cli.end_date,
                clock.now(),
            )
            .context("exporting hourly averages")?;
            println!("Exported hourly averages to {}", path.display());
        }
        if cli.summary {
            let path = export_weekly_summary(
                store,
                &config.export_path,
                cli.summary_output.clone(),
                clock.now(),
            )
            .context("exporting weekly summary")?;
            println!("Exported weekly summary to {}", path.display());
        }
        if cli.collect {
            cmd_collect(&config, store, clock)?;
        }
    }

    if cli.show_config {
        cmd_show_config(&config, &config_path)?;
    }

    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("creating async runtime")
}

fn cmd_init_config(config: &Config, path: &Path) -> Result<()> {
    config
        .save_to(path)
        .with_context(|| format!("writing config to {}", path.display()))?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

fn cmd_status(config: &Config, store: &SqliteStore) -> Result<()> {
    let stats = store.stats().context("reading database statistics")?;

    println!("Gym Occupancy Tracker Status");
    println!("============================");
    println!();
    println!("Database: {}", config.database_path.display());
    println!("  Readings: {}", stats.readings);
    println!("  Hourly averages: {}", stats.hourly_averages);
    match (stats.first_date, stats.last_date) {
        (Some(first), Some(last)) => println!("  Date range: {first} to {last}"),
        _ => println!("  Date range: no data yet"),
    }
    println!();

    let stats_path = config.data_path.join(STATS_FILE);
    if stats_path.exists() {
        let snapshot = CollectionStats::with_persistence(stats_path).snapshot();
        println!("Cumulative Collection Statistics:");
        println!("  Ticks run: {}", snapshot.ticks);
        println!("  Fetch failures: {}", snapshot.fetch_failures);
        println!("  Readings stored: {}", snapshot.readings_stored);
        println!("  Hourly averages written: {}", snapshot.buckets_aggregated);
    } else {
        println!("No previous collection session found.");
    }

    Ok(())
}

fn cmd_once(config: &Config, store: &SqliteStore, clock: LocalClock) -> Result<()> {
    let source = HttpZoneSource::new(config.api_url.clone(), config.fetch_timeout)
        .context("building HTTP client")?;
    let stats = create_shared_stats_with_persistence(config.data_path.join(STATS_FILE));

    let stored = runtime()?.block_on(collect_once(config, source, store, clock, stats.clone()))?;
    println!("Stored {stored} readings");

    if let Err(e) = stats.save() {
        warn!("Could not save collection stats: {e}");
    }
    Ok(())
}

/// One forced collection. Any fetch or store failure is an error.
async fn collect_once<Z, S, C>(
    config: &Config,
    source: Z,
    store: &S,
    clock: C,
    stats: SharedCollectionStats,
) -> Result<usize>
where
    Z: ZoneSource,
    S: SampleStore,
    C: Clock,
{
    let now = clock.now();
    let scheduler = CollectionScheduler::new(config, source, store, clock, stats);
    let readings = scheduler.collect(now).await.context("collection failed")?;
    Ok(readings.len())
}

/// Aggregate every pending hour and count the rows in `stats`.
fn sweep_pending<S: SampleStore>(
    config: &Config,
    store: &S,
    now: NaiveDateTime,
    stats: &CollectionStats,
) -> Result<SweepSummary> {
    let summary = AggregationEngine::new(store, config)
        .aggregate_all_pending(now)
        .context("aggregating pending hours")?;
    stats.record_buckets_aggregated(summary.rows_written as u64);
    Ok(summary)
}

fn cmd_aggregate(config: &Config, store: &SqliteStore, clock: LocalClock) -> Result<()> {
    let stats = CollectionStats::with_persistence(config.data_path.join(STATS_FILE));
    let summary = sweep_pending(config, store, clock.now(), &stats)?;
    if let Err(e) = stats.save() {
        warn!("Could not save collection stats: {e}");
    }

    println!(
        "Aggregated {} hours ({} rows written)",
        summary.hours_processed, summary.rows_written
    );
    if let Some(current) = summary.skipped_current {
        println!("Skipped {current} (still in progress)");
    }
    Ok(())
}

fn cmd_collect(config: &Config, store: &SqliteStore, clock: LocalClock) -> Result<()> {
    println!("Gym Occupancy Tracker v{VERSION}");
    println!();
    println!("Starting collection...");
    println!("  API: {}", config.api_url);
    println!("  Interval: {} minutes", config.collection_interval_minutes);
    println!("  Database: {}", config.database_path.display());
    println!("  Tracked zones: {}", config.zones.len());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let stats = create_shared_stats_with_persistence(config.data_path.join(STATS_FILE));

    if config.aggregate_on_startup {
        let summary = sweep_pending(config, store, clock.now(), &stats)
            .context("catching up on pending hours")?;
        info!(
            "Startup catch-up: {} hours, {} rows",
            summary.hours_processed, summary.rows_written
        );
    }

    let source = HttpZoneSource::new(config.api_url.clone(), config.fetch_timeout)
        .context("building HTTP client")?;

    let shutdown = ShutdownSignal::new();
    ctrlc_handler(shutdown.clone())?;

    let mut scheduler = CollectionScheduler::new(config, source, store, clock, stats.clone());
    runtime()?.block_on(scheduler.run(&shutdown));

    if let Err(e) = stats.save() {
        warn!("Could not save collection stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_show_config(config: &Config, path: &Path) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).context("serializing configuration")?
    );
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(shutdown: ShutdownSignal) -> Result<()> {
    ctrlc::set_handler(move || {
        shutdown.trigger();
    })
    .context("setting Ctrl+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gym_occupancy_tracker::collector::{FetchError, Reading, ZoneRecord};
    use gym_occupancy_tracker::stats::create_shared_stats;

    #[test]
    fn test_no_flags_means_no_action() {
        let cli = Cli::parse_from(["gym-tracker"]);
        assert!(!cli.has_action());
    }

    #[test]
    fn test_export_flags_parse_dates() {
        let cli = Cli::parse_from([
            "gym-tracker",
            "--export",
            "--start-date",
            "2025-01-13",
            "--end-date",
            "2025-01-19",
        ]);
        assert!(cli.has_action());
        assert_eq!(cli.start_date, NaiveDate::from_ymd_opt(2025, 1, 13));
        assert_eq!(cli.end_date, NaiveDate::from_ymd_opt(2025, 1, 19));
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(Cli::try_parse_from(["gym-tracker", "--export", "--start-date", "13/01/2025"]).is_err());
    }

    #[test]
    fn test_each_report_has_its_own_output() {
        assert!(Cli::try_parse_from(["gym-tracker", "--summary", "-o", "out.csv"]).is_err());
        assert!(Cli::try_parse_from(["gym-tracker", "--export", "--summary-output", "w.csv"]).is_err());

        let cli = Cli::parse_from([
            "gym-tracker",
            "--export",
            "--summary",
            "-o",
            "hourly.csv",
            "--summary-output",
            "weekly.csv",
        ]);
        assert_eq!(cli.output, Some(PathBuf::from("hourly.csv")));
        assert_eq!(cli.summary_output, Some(PathBuf::from("weekly.csv")));
    }

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    struct CannedSource(Option<Vec<ZoneRecord>>);

    impl ZoneSource for CannedSource {
        async fn fetch(&self) -> Result<Vec<ZoneRecord>, FetchError> {
            self.0
                .clone()
                .ok_or_else(|| FetchError::Network("connection refused".into()))
        }
    }

    // Monday
    fn monday(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 13)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_forced_collection_failure_exits_non_zero() {
        let config = Config::default();
        let store = SqliteStore::open_in_memory().unwrap();

        let result = collect_once(
            &config,
            CannedSource(None),
            &store,
            FixedClock(monday(9)),
            create_shared_stats(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(exit_code(result.map(|_| ())), ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_forced_collection_stores_readings() {
        let config = Config::default();
        let store = SqliteStore::open_in_memory().unwrap();
        let record = ZoneRecord {
            location_id: Some(3903),
            facility_id: Some(802),
            last_count: Some(30),
            total_capacity: Some(100),
            ..ZoneRecord::default()
        };

        let stored = collect_once(
            &config,
            CannedSource(Some(vec![record])),
            &store,
            FixedClock(monday(9)),
            create_shared_stats(),
        )
        .await
        .unwrap();

        assert_eq!(stored, 1);
        assert_eq!(exit_code(Ok(())), ExitCode::SUCCESS);
    }

    #[test]
    fn test_sweep_counts_rows_written() {
        let config = Config::default();
        let store = SqliteStore::open_in_memory().unwrap();
        for (h, zone) in [(8, 3903), (8, 4339), (9, 3903)] {
            let reading = Reading::new(monday(h), 802, "JWC", zone, "Zone", 20, 100);
            store.insert_reading(&reading).unwrap();
        }

        let stats = CollectionStats::new();
        let summary = sweep_pending(&config, &store, monday(12), &stats).unwrap();

        assert_eq!(summary.rows_written, 3);
        assert_eq!(stats.snapshot().buckets_aggregated, 3);
    }
}
