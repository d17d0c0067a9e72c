//! SQLite-backed [`SampleStore`].
//!
//! Timestamps are stored as facility-local `YYYY-MM-DD HH:MM:SS` text so that
//! lexical order is chronological order and SQLite's date functions apply.

use super::{SampleStore, StoreError};
use crate::collector::types::Reading;
use crate::core::aggregation::HourlyAverage;
use crate::core::bucket::HourBucket;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const CURRENT_SCHEMA_VERSION: i32 = 1;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Row counts and date range, for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub readings: u64,
    pub hourly_averages: u64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and bring its schema
    /// up to date.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets export jobs read while the collector writes.
        if let Err(err) =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        {
            warn!("Failed to enable WAL mode: {err}");
        }

        let store = Self::init(conn)?;
        info!("Database initialized at {}", path.display());
        Ok(store)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let readings: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        let hourly_averages: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM hourly_averages", [], |row| row.get(0))?;
        let (first, last): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date(timestamp)), MAX(date(timestamp)) FROM readings",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStats {
            readings: to_u64(readings)?,
            hourly_averages: to_u64(hourly_averages)?,
            first_date: first.as_deref().map(parse_date).transpose()?,
            last_date: last.as_deref().map(parse_date).transpose()?,
        })
    }
}

impl SampleStore for SqliteStore {
    fn insert_reading(&self, reading: &Reading) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO readings
             (timestamp, location_id, location_name, facility_id, facility_name, count, capacity, percentage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                reading.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                reading.zone_id,
                reading.zone_name,
                reading.facility_id,
                reading.facility_name,
                reading.count,
                reading.capacity,
                reading.percentage(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_readings(&self, readings: &[Reading]) -> Result<(), StoreError> {
        if readings.is_empty() {
            return Ok(());
        }
        // One transaction per collection: either the whole batch lands or none of it.
        let tx = self.conn.unchecked_transaction()?;
        for reading in readings {
            self.insert_reading(reading)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query_readings(&self, bucket: HourBucket, zone_id: u32) -> Result<Vec<Reading>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, facility_id, facility_name, location_id, location_name, count, capacity
             FROM readings
             WHERE timestamp >= ?1 AND timestamp < ?2 AND location_id = ?3
             ORDER BY timestamp, id",
        )?;

        let mut rows = stmt.query(params![
            bucket.start().format(TIMESTAMP_FORMAT).to_string(),
            bucket.end().format(TIMESTAMP_FORMAT).to_string(),
            zone_id,
        ])?;

        let mut readings = Vec::new();
        while let Some(row) = rows.next()? {
            readings.push(reading_from_row(row)?);
        }
        Ok(readings)
    }

    fn upsert_hourly_average(&self, average: &HourlyAverage) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO hourly_averages
             (date, hour, day_of_week, facility_id, facility_name, location_id, location_name, avg_percentage, sample_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(date, hour, location_id) DO UPDATE SET
                 day_of_week = excluded.day_of_week,
                 facility_id = excluded.facility_id,
                 facility_name = excluded.facility_name,
                 location_name = excluded.location_name,
                 avg_percentage = excluded.avg_percentage,
                 sample_count = excluded.sample_count",
            params![
                average.date.format(DATE_FORMAT).to_string(),
                average.hour,
                average.day_of_week,
                average.facility_id,
                average.facility_name,
                average.zone_id,
                average.zone_name,
                average.avg_percentage,
                average.sample_count,
            ],
        )?;
        Ok(())
    }

    fn list_distinct_date_hours(&self) -> Result<Vec<HourBucket>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT date(timestamp) AS d, CAST(strftime('%H', timestamp) AS INTEGER) AS h
             FROM readings
             ORDER BY d, h",
        )?;

        let mut rows = stmt.query([])?;
        let mut buckets = Vec::new();
        while let Some(row) = rows.next()? {
            let date = parse_date(&row.get::<_, String>(0)?)?;
            let hour: u32 = row.get(1)?;
            let bucket = HourBucket::new(date, hour)
                .ok_or_else(|| StoreError::Corrupt(format!("hour {hour} out of range")))?;
            buckets.push(bucket);
        }
        Ok(buckets)
    }

    fn query_hourly_averages(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<HourlyAverage>, StoreError> {
        let mut query = String::from(
            "SELECT date, hour, day_of_week, facility_id, facility_name, location_id, location_name,
                    avg_percentage, sample_count
             FROM hourly_averages",
        );
        let mut bounds = Vec::new();

        match (start, end) {
            (Some(s), Some(e)) => {
                query.push_str(" WHERE date BETWEEN ?1 AND ?2");
                bounds.push(s.format(DATE_FORMAT).to_string());
                bounds.push(e.format(DATE_FORMAT).to_string());
            }
            (Some(s), None) => {
                query.push_str(" WHERE date >= ?1");
                bounds.push(s.format(DATE_FORMAT).to_string());
            }
            (None, Some(e)) => {
                query.push_str(" WHERE date <= ?1");
                bounds.push(e.format(DATE_FORMAT).to_string());
            }
            (None, None) => {}
        }
        query.push_str(" ORDER BY date, hour, facility_name, location_name");

        let mut stmt = self.conn.prepare(&query)?;
        let mut rows = stmt.query(params_from_iter(bounds.iter()))?;

        let mut averages = Vec::new();
        while let Some(row) = rows.next()? {
            averages.push(HourlyAverage {
                date: parse_date(&row.get::<_, String>(0)?)?,
                hour: row.get(1)?,
                day_of_week: row.get(2)?,
                facility_id: row.get(3)?,
                facility_name: row.get(4)?,
                zone_id: row.get(5)?,
                zone_name: row.get(6)?,
                avg_percentage: row.get(7)?,
                sample_count: row.get(8)?,
            });
        }
        Ok(averages)
    }
}

fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    let mut current = version;
    while current < CURRENT_SCHEMA_VERSION {
        current += 1;
        match current {
            1 => tx.execute_batch(include_str!("schemas/schema_v1.sql"))?,
            other => {
                return Err(StoreError::Corrupt(format!("no migration for version {other}")));
            }
        }
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

fn reading_from_row(row: &Row<'_>) -> Result<Reading, StoreError> {
    let timestamp: String = row.get(0)?;
    let timestamp = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{timestamp}': {e}")))?;

    Ok(Reading::new(
        timestamp,
        row.get(1)?,
        row.get::<_, String>(2)?,
        row.get(3)?,
        row.get::<_, String>(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("invalid date '{value}': {e}")))
}

fn to_u64(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative count {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn reading(at: NaiveDateTime, zone_id: u32, count: i64) -> Reading {
        Reading::new(at, 802, "JWC", zone_id, "Free Weight Zone", count, 100)
    }

    fn average(d: u32, hour: u32, zone_id: u32, pct: f64) -> HourlyAverage {
        let date = NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
        HourlyAverage {
            date,
            hour,
            day_of_week: 0,
            facility_id: 802,
            facility_name: "JWC".into(),
            zone_id,
            zone_name: "Free Weight Zone".into(),
            avg_percentage: pct,
            sample_count: 4,
        }
    }

    #[test]
    fn test_insert_and_query_bucket_bounds() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_reading(&reading(ts(13, 8, 59, 59), 3903, 10)).unwrap();
        store.insert_reading(&reading(ts(13, 9, 0, 0), 3903, 20)).unwrap();
        store.insert_reading(&reading(ts(13, 9, 59, 59), 3903, 30)).unwrap();
        store.insert_reading(&reading(ts(13, 10, 0, 0), 3903, 40)).unwrap();
        store.insert_reading(&reading(ts(13, 9, 30, 0), 4339, 50)).unwrap();

        let bucket = HourBucket::new(ts(13, 0, 0, 0).date(), 9).unwrap();
        let found = store.query_readings(bucket, 3903).unwrap();
        let counts: Vec<i64> = found.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![20, 30]);
        assert_eq!(found[0].percentage(), 20.0);
    }

    #[test]
    fn test_insert_returns_increasing_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.insert_reading(&reading(ts(13, 9, 0, 0), 3903, 1)).unwrap();
        let b = store.insert_reading(&reading(ts(13, 9, 0, 0), 3903, 1)).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_insert_readings_batch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let batch = vec![
            reading(ts(13, 9, 0, 0), 3903, 10),
            reading(ts(13, 9, 0, 0), 4339, 20),
        ];
        store.insert_readings(&batch).unwrap();
        store.insert_readings(&[]).unwrap();
        assert_eq!(store.stats().unwrap().readings, 2);
    }

    #[test]
    fn test_distinct_date_hours_sorted() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_reading(&reading(ts(14, 0, 15, 0), 3903, 1)).unwrap();
        store.insert_reading(&reading(ts(13, 23, 45, 0), 3903, 1)).unwrap();
        store.insert_reading(&reading(ts(13, 9, 0, 0), 3903, 1)).unwrap();
        store.insert_reading(&reading(ts(13, 9, 15, 0), 4339, 1)).unwrap();

        let buckets: Vec<String> = store
            .list_distinct_date_hours()
            .unwrap()
            .iter()
            .map(|b| b.to_string())
            .collect();
        assert_eq!(
            buckets,
            vec!["2025-01-13 09:00", "2025-01-13 23:00", "2025-01-14 00:00"]
        );
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_hourly_average(&average(13, 9, 3903, 30.0)).unwrap();
        store.upsert_hourly_average(&average(13, 9, 3903, 45.5)).unwrap();

        let rows = store.query_hourly_averages(None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_percentage, 45.5);
    }

    #[test]
    fn test_query_hourly_averages_date_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_hourly_average(&average(13, 9, 3903, 10.0)).unwrap();
        store.upsert_hourly_average(&average(14, 9, 3903, 20.0)).unwrap();
        store.upsert_hourly_average(&average(15, 9, 3903, 30.0)).unwrap();

        let d = |day| NaiveDate::from_ymd_opt(2025, 1, day);
        assert_eq!(store.query_hourly_averages(d(14), None).unwrap().len(), 2);
        assert_eq!(store.query_hourly_averages(None, d(14)).unwrap().len(), 2);
        assert_eq!(store.query_hourly_averages(d(14), d(14)).unwrap().len(), 1);
    }

    #[test]
    fn test_query_hourly_averages_ordering() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_hourly_average(&average(13, 10, 3903, 10.0)).unwrap();
        store.upsert_hourly_average(&average(13, 9, 3903, 20.0)).unwrap();
        store.upsert_hourly_average(&average(12, 22, 3903, 30.0)).unwrap();

        let hours: Vec<(u32, u32)> = store
            .query_hourly_averages(None, None)
            .unwrap()
            .iter()
            .map(|a| (a.date.format("%d").to_string().parse().unwrap(), a.hour))
            .collect();
        assert_eq!(hours, vec![(12, 22), (13, 9), (13, 10)]);
    }

    #[test]
    fn test_stats() {
        let store = SqliteStore::open_in_memory().unwrap();
        let empty = store.stats().unwrap();
        assert_eq!(empty.readings, 0);
        assert_eq!(empty.first_date, None);

        store.insert_reading(&reading(ts(13, 9, 0, 0), 3903, 1)).unwrap();
        store.insert_reading(&reading(ts(15, 9, 0, 0), 3903, 1)).unwrap();
        store.upsert_hourly_average(&average(13, 9, 3903, 1.0)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.readings, 2);
        assert_eq!(stats.hourly_averages, 1);
        assert_eq!(stats.first_date, NaiveDate::from_ymd_opt(2025, 1, 13));
        assert_eq!(stats.last_date, NaiveDate::from_ymd_opt(2025, 1, 15));
    }

    #[test]
    fn test_reopen_file_keeps_schema() {
        let path = std::env::temp_dir().join("gym-tracker-store-reopen-test.db");
        let _ = std::fs::remove_file(&path);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_reading(&reading(ts(13, 9, 0, 0), 3903, 1)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.stats().unwrap().readings, 1);
        drop(store);
        let _ = std::fs::remove_file(&path);
    }
}
