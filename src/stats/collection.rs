//! Running counters for the collector.
//!
//! Tracks how many ticks ran, how many fetches failed, and how much was
//! stored and aggregated. Counters persist across restarts as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Collection counters for the current process, seeded from disk.
#[derive(Debug)]
pub struct CollectionStats {
    ticks: AtomicU64,
    fetch_failures: AtomicU64,
    readings_stored: AtomicU64,
    buckets_aggregated: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl CollectionStats {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            readings_stored: AtomicU64::new(0),
            buckets_aggregated: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create counters that load from and save to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            warn!("Could not load previous collection stats: {e}");
        }

        stats
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_readings_stored(&self, count: u64) {
        self.readings_stored.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_buckets_aggregated(&self, count: u64) {
        self.buckets_aggregated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            readings_stored: self.readings_stored.load(Ordering::Relaxed),
            buckets_aggregated: self.buckets_aggregated.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Collection Statistics:\n\
             - Ticks run: {}\n\
             - Fetch failures: {}\n\
             - Readings stored: {}\n\
             - Hourly averages written: {}\n\
             - Session duration: {} seconds",
            stats.ticks,
            stats.fetch_failures,
            stats.readings_stored,
            stats.buckets_aggregated,
            stats.session_duration_secs
        )
    }

    /// Save counters to disk, if persistence is configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                ticks: stats.ticks,
                fetch_failures: stats.fetch_failures,
                readings_stored: stats.readings_stored,
                buckets_aggregated: stats.buckets_aggregated,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.ticks.store(persisted.ticks, Ordering::Relaxed);
                self.fetch_failures
                    .store(persisted.fetch_failures, Ordering::Relaxed);
                self.readings_stored
                    .store(persisted.readings_stored, Ordering::Relaxed);
                self.buckets_aggregated
                    .store(persisted.buckets_aggregated, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for CollectionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub fetch_failures: u64,
    pub readings_stored: u64,
    pub buckets_aggregated: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    ticks: u64,
    fetch_failures: u64,
    readings_stored: u64,
    buckets_aggregated: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared counters.
pub type SharedCollectionStats = Arc<CollectionStats>;

pub fn create_shared_stats() -> SharedCollectionStats {
    Arc::new(CollectionStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedCollectionStats {
    Arc::new(CollectionStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = CollectionStats::new();
        stats.record_tick();
        stats.record_tick();
        stats.record_fetch_failure();
        stats.record_readings_stored(6);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.ticks, 2);
        assert_eq!(snapshot.fetch_failures, 1);
        assert_eq!(snapshot.readings_stored, 6);
        assert_eq!(snapshot.buckets_aggregated, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = CollectionStats::new().summary();
        assert!(summary.contains("Ticks run: 0"));
        assert!(summary.contains("Fetch failures"));
        assert!(summary.contains("Hourly averages written"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir().join("gym-tracker-stats-test.json");
        let _ = std::fs::remove_file(&path);

        let stats = CollectionStats::with_persistence(path.clone());
        stats.record_readings_stored(12);
        stats.record_buckets_aggregated(3);
        stats.save().unwrap();

        let reloaded = CollectionStats::with_persistence(path.clone());
        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.readings_stored, 12);
        assert_eq!(snapshot.buckets_aggregated, 3);

        let _ = std::fs::remove_file(&path);
    }
}
