//! Folding raw readings into hourly per-zone averages.
//!
//! Each (date, hour, zone) bucket maps to at most one [`HourlyAverage`] row.
//! Re-running a bucket recomputes it from every stored reading and replaces
//! the old row, so aggregation can be repeated safely.

use crate::collector::types::{round_one_decimal, Reading};
use crate::config::Config;
use crate::core::bucket::HourBucket;
use crate::store::{SampleStore, StoreError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Mean occupancy of one zone over one clock hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyAverage {
    pub date: NaiveDate,
    /// 0-23
    pub hour: u32,
    /// 0 = Monday ... 6 = Sunday
    pub day_of_week: u32,
    pub facility_id: u32,
    pub facility_name: String,
    pub zone_id: u32,
    pub zone_name: String,
    /// One decimal place
    pub avg_percentage: f64,
    pub sample_count: u32,
}

/// Result of one `aggregate_all_pending` sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Hours that were aggregated
    pub hours_processed: usize,
    /// Rows written across all hours and zones
    pub rows_written: usize,
    /// The in-progress hour, if readings for it existed
    pub skipped_current: Option<HourBucket>,
}

/// Mean percentage and sample count, or `None` for an empty slice.
///
/// The mean is rounded half away from zero to one decimal place.
pub fn summarize(readings: &[Reading]) -> Option<(f64, u32)> {
    if readings.is_empty() {
        return None;
    }
    let total: f64 = readings.iter().map(Reading::percentage).sum();
    let mean = total / readings.len() as f64;
    let count = u32::try_from(readings.len()).unwrap_or(u32::MAX);
    Some((round_one_decimal(mean), count))
}

pub struct AggregationEngine<'a, S: SampleStore> {
    store: &'a S,
    config: &'a Config,
}

impl<'a, S: SampleStore> AggregationEngine<'a, S> {
    pub fn new(store: &'a S, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Recompute and store the average for one zone in one hour.
    ///
    /// Returns `Ok(None)` without writing anything when the bucket holds no
    /// readings.
    pub fn aggregate(
        &self,
        bucket: HourBucket,
        zone_id: u32,
    ) -> Result<Option<HourlyAverage>, StoreError> {
        let readings = self.store.query_readings(bucket, zone_id)?;
        let Some((avg_percentage, sample_count)) = summarize(&readings) else {
            debug!("No readings for zone {zone_id} at {bucket}");
            return Ok(None);
        };

        // Every reading in the bucket belongs to the same zone; take the
        // facility from the first one.
        let first = &readings[0];
        let facility_name = self
            .config
            .facility_name(first.facility_id)
            .unwrap_or(&first.facility_name)
            .to_string();
        let zone_name = self
            .config
            .zone(zone_id)
            .map(|z| z.name.clone())
            .unwrap_or_else(|| first.zone_name.clone());

        let average = HourlyAverage {
            date: bucket.date(),
            hour: bucket.hour(),
            day_of_week: bucket.day_of_week(),
            facility_id: first.facility_id,
            facility_name,
            zone_id,
            zone_name,
            avg_percentage,
            sample_count,
        };

        self.store.upsert_hourly_average(&average)?;
        info!(
            "  {:02}:00 {} {}: {:.1}% (n={})",
            average.hour,
            average.facility_name,
            average.zone_name,
            average.avg_percentage,
            average.sample_count
        );

        Ok(Some(average))
    }

    /// Aggregate every tracked zone for one hour. Returns the rows written.
    pub fn aggregate_hour(&self, bucket: HourBucket) -> Result<usize, StoreError> {
        let mut written = 0;
        for zone in &self.config.zones {
            if self.aggregate(bucket, zone.id)?.is_some() {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Aggregate every hour that has readings, oldest first, except the hour
    /// containing `now`, which is still collecting.
    pub fn aggregate_all_pending(&self, now: NaiveDateTime) -> Result<SweepSummary, StoreError> {
        let current = HourBucket::containing(now);
        let mut summary = SweepSummary::default();

        for bucket in self.store.list_distinct_date_hours()? {
            if bucket == current {
                summary.skipped_current = Some(bucket);
                continue;
            }

            info!("Processing {bucket}");
            summary.rows_written += self.aggregate_hour(bucket)?;
            summary.hours_processed += 1;
        }

        Ok(summary)
    }
}
