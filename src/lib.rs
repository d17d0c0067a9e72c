//! Gym Occupancy Tracker - periodic zone occupancy sampling for campus gyms.
//!
//! This library polls a public facility-count feed on a fixed wall-clock
//! cadence, keeps the readings for tracked zones while their facility is
//! open, and rolls them up into per-hour averages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Gym Occupancy Tracker                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Fetch     │──▶│ Zone Filter │──▶│   Store     │        │
//! │  │ (HTTP JSON) │   │(hours/zones)│   │  (SQLite)   │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         ▲                                    │              │
//! │         │                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐        │
//! │  │  Scheduler  │────────────────────▶│ Aggregation │        │
//! │  │ (:00/:15/..)│                     │  (hourly)   │        │
//! │  └─────────────┘                     └─────────────┘        │
//! │                                              │              │
//! │                                              ▼              │
//! │                                      ┌─────────────┐        │
//! │                                      │ CSV Export  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gym_occupancy_tracker::{AggregationEngine, Clock, Config, LocalClock, SqliteStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let store = SqliteStore::open(&config.database_path)?;
//! let clock = LocalClock::from_basis(&config.time_basis).ok_or("bad time basis")?;
//!
//! let summary = AggregationEngine::new(&store, &config).aggregate_all_pending(clock.now())?;
//! println!("{} rows written", summary.rows_written);
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod export;
pub mod stats;
pub mod store;

// Re-export key types at crate root for convenience
pub use collector::{FetchError, HttpZoneSource, Reading, ZoneFilter, ZoneRecord, ZoneSource};
pub use config::{Config, ConfigError, FacilityConfig, OperatingWindow, TimeBasis, TrackedZone};
pub use crate::core::{
    AggregationEngine, Clock, CollectError, CollectionScheduler, HourBucket, HourlyAverage,
    LocalClock, OperatingHours, ShutdownSignal, SweepSummary,
};
pub use export::{ExportError, WeeklySummaryRow};
pub use stats::{CollectionStats, SharedCollectionStats};
pub use store::{SampleStore, SqliteStore, StoreError, StoreStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
