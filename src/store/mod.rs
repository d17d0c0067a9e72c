//! Persistent storage of raw readings and hourly averages.

pub mod sqlite;

use crate::collector::types::Reading;
use crate::core::aggregation::HourlyAverage;
use crate::core::bucket::HourBucket;
use chrono::NaiveDate;
use thiserror::Error;

pub use sqlite::{SqliteStore, StoreStats};

/// Storage operations the pipeline relies on.
///
/// Each call commits on its own, so an interrupted process never leaves a
/// half-written row behind.
pub trait SampleStore {
    /// Append one reading, returning its row id.
    fn insert_reading(&self, reading: &Reading) -> Result<i64, StoreError>;

    /// Append a batch of readings taken in one collection.
    fn insert_readings(&self, readings: &[Reading]) -> Result<(), StoreError> {
        for reading in readings {
            self.insert_reading(reading)?;
        }
        Ok(())
    }

    /// All readings for `zone_id` whose timestamp falls in `bucket`.
    fn query_readings(&self, bucket: HourBucket, zone_id: u32) -> Result<Vec<Reading>, StoreError>;

    /// Insert or replace the average for its (date, hour, zone).
    fn upsert_hourly_average(&self, average: &HourlyAverage) -> Result<(), StoreError>;

    /// Every (date, hour) with at least one reading, oldest first.
    fn list_distinct_date_hours(&self) -> Result<Vec<HourBucket>, StoreError>;

    /// Hourly averages within an inclusive date range, ordered by
    /// (date, hour, facility, zone).
    fn query_hourly_averages(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HourlyAverage>, StoreError>;
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i32, supported: i32 },
    #[error("corrupt row: {0}")]
    Corrupt(String),
}
