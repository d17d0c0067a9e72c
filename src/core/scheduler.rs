//! Collection scheduler.
//!
//! Wakes on wall-clock boundaries that are multiples of the collection
//! interval (:00/:15/:30/:45 for 15 minutes). Each tick first aggregates the
//! hour that just closed, if any, then fetches, filters and stores a fresh
//! set of readings. Ticks never overlap: the next sleep starts only after the
//! current tick is done.

use crate::collector::{FetchError, Reading, ZoneFilter, ZoneSource};
use crate::config::Config;
use crate::core::aggregation::AggregationEngine;
use crate::core::bucket::HourBucket;
use crate::core::clock::Clock;
use crate::stats::SharedCollectionStats;
use crate::store::{SampleStore, StoreError};
use chrono::{NaiveDateTime, Timelike};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Time from `now` to the next aligned tick.
///
/// A tick that lands exactly on a boundary waits a full interval rather than
/// zero.
pub fn wait_until_next_tick(now: NaiveDateTime, interval_minutes: u32) -> Duration {
    let interval = i64::from(interval_minutes.max(1));
    let minutes_until = interval - i64::from(now.minute()) % interval;
    let secs = minutes_until * 60 - i64::from(now.second());

    if secs <= 0 {
        Duration::from_secs((interval * 60) as u64)
    } else {
        Duration::from_secs(secs as u64)
    }
}

/// Hour last seen by the scheduler, carried between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerState {
    recorded: Option<HourBucket>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded hour, if `now` falls in a later one.
    pub fn closed_bucket(&self, now: NaiveDateTime) -> Option<HourBucket> {
        let current = HourBucket::containing(now);
        self.recorded.filter(|previous| *previous < current)
    }

    pub fn record(&mut self, now: NaiveDateTime) {
        self.recorded = Some(HourBucket::containing(now));
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub at: NaiveDateTime,
    /// Closed hour and number of rows written for it
    pub aggregated: Option<(HourBucket, usize)>,
    /// False when the fetch failed and the tick was skipped
    pub fetched: bool,
    pub readings_stored: usize,
}

/// A forced collection failed.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cooperative stop request, honoured between ticks and during the sleep.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolve once [`trigger`](Self::trigger) has been called.
    pub async fn wait(&self) {
        while !self.is_triggered() {
            self.notify.notified().await;
        }
    }
}

pub struct CollectionScheduler<'a, Z, S, C>
where
    Z: ZoneSource,
    S: SampleStore,
    C: Clock,
{
    config: &'a Config,
    source: Z,
    store: &'a S,
    clock: C,
    filter: ZoneFilter,
    state: SchedulerState,
    stats: SharedCollectionStats,
}

impl<'a, Z, S, C> CollectionScheduler<'a, Z, S, C>
where
    Z: ZoneSource,
    S: SampleStore,
    C: Clock,
{
    pub fn new(
        config: &'a Config,
        source: Z,
        store: &'a S,
        clock: C,
        stats: SharedCollectionStats,
    ) -> Self {
        Self {
            config,
            source,
            store,
            clock,
            filter: ZoneFilter::new(config),
            state: SchedulerState::new(),
            stats,
        }
    }

    /// Fetch, filter and store one set of readings taken at `at`.
    ///
    /// A failed fetch stores nothing.
    pub async fn collect(&self, at: NaiveDateTime) -> Result<Vec<Reading>, CollectError> {
        let records = self.source.fetch().await?;
        let readings = self.filter.filter(&records, at);

        self.store.insert_readings(&readings)?;
        self.stats.record_readings_stored(readings.len() as u64);

        for reading in &readings {
            info!(
                "  {} {}: {}/{} ({:.1}%)",
                reading.facility_name,
                reading.zone_name,
                reading.count,
                reading.capacity,
                reading.percentage()
            );
        }

        if readings.is_empty() {
            info!("All gyms currently closed - no data collected");
        } else {
            info!("Collected {} zone readings", readings.len());
        }

        Ok(readings)
    }

    /// Run one tick: aggregate a just-closed hour, then collect.
    ///
    /// Fetch failures are logged and skip the collection. Store failures are
    /// returned; the recorded hour only advances once the closed hour has
    /// been aggregated, so a failed aggregation is retried on the next tick.
    pub async fn tick(&mut self) -> Result<TickReport, StoreError> {
        let now = self.clock.now();
        self.stats.record_tick();

        let mut report = TickReport {
            at: now,
            aggregated: None,
            fetched: false,
            readings_stored: 0,
        };

        if let Some(closed) = self.state.closed_bucket(now) {
            info!("Calculating hourly averages for {closed}");
            let engine = AggregationEngine::new(self.store, self.config);
            let written = engine.aggregate_hour(closed)?;
            self.stats.record_buckets_aggregated(written as u64);
            report.aggregated = Some((closed, written));
        }
        self.state.record(now);

        info!("Collecting data at {}", now.format("%Y-%m-%d %H:%M:%S"));
        match self.collect(now).await {
            Ok(readings) => {
                report.fetched = true;
                report.readings_stored = readings.len();
            }
            Err(CollectError::Fetch(e)) => {
                self.stats.record_fetch_failure();
                warn!("Failed to fetch API data: {e}");
            }
            Err(CollectError::Store(e)) => return Err(e),
        }

        Ok(report)
    }

    /// Tick on every aligned boundary until `shutdown` fires.
    pub async fn run(&mut self, shutdown: &ShutdownSignal) {
        info!(
            "Collector started (interval: {} minutes)",
            self.config.collection_interval_minutes
        );

        while !shutdown.is_triggered() {
            if let Err(e) = self.tick().await {
                error!("Tick failed: {e}");
            }

            let wait = wait_until_next_tick(
                self.clock.now(),
                self.config.collection_interval_minutes,
            );
            info!(
                "Next collection in {}m {}s",
                wait.as_secs() / 60,
                wait.as_secs() % 60
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!("Collector stopped");
    }
}
