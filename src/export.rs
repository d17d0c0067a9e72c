//! CSV reports over hourly averages.
//!
//! Two reports are produced: a flat dump of hourly averages, and a weekly
//! profile that averages each (day of week, hour, zone) slot across all
//! sampled days.

use crate::collector::types::round_one_decimal;
use crate::core::aggregation::HourlyAverage;
use crate::store::{SampleStore, StoreError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const SHORT_DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One row of the weekly profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummaryRow {
    /// 0 = Monday ... 6 = Sunday
    pub day_of_week: u32,
    pub hour: u32,
    pub facility_name: String,
    pub zone_name: String,
    /// Mean of the hourly averages, one decimal place
    pub overall_avg: f64,
    pub days_sampled: u32,
}

/// Average the hourly rows per (day of week, hour, facility, zone), ordered
/// by that key.
pub fn weekly_summary(rows: &[HourlyAverage]) -> Vec<WeeklySummaryRow> {
    let mut groups: BTreeMap<(u32, u32, &str, &str), (f64, u32)> = BTreeMap::new();
    for row in rows {
        let entry = groups
            .entry((
                row.day_of_week,
                row.hour,
                row.facility_name.as_str(),
                row.zone_name.as_str(),
            ))
            .or_insert((0.0, 0));
        entry.0 += row.avg_percentage;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((day_of_week, hour, facility, zone), (sum, n))| WeeklySummaryRow {
            day_of_week,
            hour,
            facility_name: facility.to_string(),
            zone_name: zone.to_string(),
            overall_avg: round_one_decimal(sum / f64::from(n)),
            days_sampled: n,
        })
        .collect()
}

/// `8` -> `8:00AM`, `0` -> `12:00AM`, `12` -> `12:00PM`, `13` -> `1:00PM`.
pub fn format_hour_12(hour: u32) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display}:00{suffix}")
}

fn day_name(names: &[&'static str; 7], day_of_week: u32) -> &'static str {
    names.get(day_of_week as usize).copied().unwrap_or("?")
}

/// Write hourly averages as CSV.
pub fn write_hourly_csv<W: Write>(rows: &[HourlyAverage], writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["Date", "Day", "Hour", "Facility", "Zone", "Avg %", "Samples"])?;

    for row in rows {
        csv.write_record([
            row.date.format("%Y-%m-%d").to_string(),
            day_name(&SHORT_DAY_NAMES, row.day_of_week).to_string(),
            format!("{:02}:00", row.hour),
            row.facility_name.clone(),
            row.zone_name.clone(),
            format!("{:.0}%", row.avg_percentage),
            row.sample_count.to_string(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Write the weekly profile as CSV.
pub fn write_weekly_csv<W: Write>(rows: &[WeeklySummaryRow], writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["Day", "Hour", "Facility", "Zone", "Avg %", "Days Sampled"])?;

    for row in rows {
        csv.write_record([
            day_name(&DAY_NAMES, row.day_of_week).to_string(),
            format_hour_12(row.hour),
            row.facility_name.clone(),
            row.zone_name.clone(),
            format!("{:.0}%", row.overall_avg),
            row.days_sampled.to_string(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

fn resolve_output(
    export_dir: &Path,
    output: Option<PathBuf>,
    prefix: &str,
    generated_at: NaiveDateTime,
) -> Result<PathBuf, ExportError> {
    let path = match output {
        Some(path) => path,
        None => export_dir.join(format!(
            "{prefix}_{}.csv",
            generated_at.format("%Y%m%d_%H%M%S")
        )),
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(path)
}

/// Export hourly averages in an optional date range to a CSV file.
pub fn export_hourly_averages<S: SampleStore>(
    store: &S,
    export_dir: &Path,
    output: Option<PathBuf>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    generated_at: NaiveDateTime,
) -> Result<PathBuf, ExportError> {
    let rows = store.query_hourly_averages(start, end)?;
    let path = resolve_output(export_dir, output, "hourly_averages", generated_at)?;

    write_hourly_csv(&rows, File::create(&path)?)?;
    info!("Exported {} records to {}", rows.len(), path.display());
    Ok(path)
}

/// Export the weekly profile over all hourly averages to a CSV file.
pub fn export_weekly_summary<S: SampleStore>(
    store: &S,
    export_dir: &Path,
    output: Option<PathBuf>,
    generated_at: NaiveDateTime,
) -> Result<PathBuf, ExportError> {
    let rows = weekly_summary(&store.query_hourly_averages(None, None)?);
    let path = resolve_output(export_dir, output, "weekly_summary", generated_at)?;

    write_weekly_csv(&rows, File::create(&path)?)?;
    info!("Exported weekly summary to {}", path.display());
    Ok(path)
}
