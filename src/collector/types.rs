//! Record types flowing through the collector.
//!
//! [`ZoneRecord`] mirrors what the facility-count API returns. [`Reading`] is
//! the validated sample that gets persisted.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One zone entry as reported by the facility-count API.
///
/// Every field is optional on the wire; defaults are applied when the record
/// is turned into a [`Reading`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ZoneRecord {
    #[serde(default)]
    pub location_id: Option<u32>,
    #[serde(default)]
    pub facility_id: Option<u32>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub facility_name: Option<String>,
    #[serde(default)]
    pub last_count: Option<i64>,
    #[serde(default)]
    pub total_capacity: Option<i64>,
}

impl ZoneRecord {
    pub fn location_name_or_default(&self) -> &str {
        self.location_name.as_deref().unwrap_or("Unknown")
    }

    pub fn count_or_default(&self) -> i64 {
        self.last_count.unwrap_or(0)
    }

    pub fn capacity_or_default(&self) -> i64 {
        self.total_capacity.unwrap_or(1)
    }
}

/// One occupancy sample of one zone at one instant.
///
/// The percentage is always derived from count and capacity and cannot be
/// set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Facility-local time, second precision
    pub timestamp: NaiveDateTime,
    pub facility_id: u32,
    pub facility_name: String,
    pub zone_id: u32,
    pub zone_name: String,
    pub count: i64,
    pub capacity: i64,
    percentage: f64,
}

impl Reading {
    pub fn new(
        timestamp: NaiveDateTime,
        facility_id: u32,
        facility_name: impl Into<String>,
        zone_id: u32,
        zone_name: impl Into<String>,
        count: i64,
        capacity: i64,
    ) -> Self {
        Self {
            timestamp: truncate_to_second(timestamp),
            facility_id,
            facility_name: facility_name.into(),
            zone_id,
            zone_name: zone_name.into(),
            count,
            capacity,
            percentage: occupancy_percentage(count, capacity),
        }
    }

    /// Occupancy as a percentage of capacity, one decimal place.
    pub fn percentage(&self) -> f64 {
        self.percentage
    }
}

/// `count / capacity * 100`, clamped at zero and rounded to one decimal.
///
/// A capacity of zero or below yields 0; the API reports zero capacity for
/// temporarily disabled zones.
pub fn occupancy_percentage(count: i64, capacity: i64) -> f64 {
    if capacity <= 0 {
        return 0.0;
    }
    let pct = count as f64 / capacity as f64 * 100.0;
    round_one_decimal(pct.max(0.0))
}

/// Round half away from zero to one decimal place.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn truncate_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 13)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_percentage_is_derived() {
        let reading = Reading::new(at(9, 0), 802, "JWC", 3903, "Free Weight Zone", 45, 120);
        assert!((reading.percentage() - 37.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_capacity_gives_zero() {
        assert_eq!(occupancy_percentage(12, 0), 0.0);
        assert_eq!(occupancy_percentage(12, -5), 0.0);
    }

    #[test]
    fn test_negative_count_clamped() {
        assert_eq!(occupancy_percentage(-3, 50), 0.0);
    }

    #[test]
    fn test_rounding() {
        // 1/3 -> 33.333..
        assert_eq!(occupancy_percentage(1, 3), 33.3);
        // 2/3 -> 66.666..
        assert_eq!(occupancy_percentage(2, 3), 66.7);
        assert_eq!(round_one_decimal(12.25), 12.3);
    }

    #[test]
    fn test_timestamp_truncated_to_second() {
        let ts = at(9, 0).with_nanosecond(750_000_000).unwrap();
        let reading = Reading::new(ts, 802, "JWC", 3903, "Zone", 1, 10);
        assert_eq!(reading.timestamp, at(9, 0));
    }

    #[test]
    fn test_zone_record_defaults() {
        let record: ZoneRecord = serde_json::from_str(r#"{"LocationId": 4011}"#).unwrap();
        assert_eq!(record.location_id, Some(4011));
        assert_eq!(record.location_name_or_default(), "Unknown");
        assert_eq!(record.count_or_default(), 0);
        assert_eq!(record.capacity_or_default(), 1);
    }

    #[test]
    fn test_zone_record_ignores_extra_fields() {
        let json = r#"{
            "LocationId": 3903,
            "FacilityId": 802,
            "LocationName": "Free Weight Zone",
            "LastCount": 40,
            "TotalCapacity": 100,
            "LastUpdatedDateAndTime": "2025-01-13T09:00:00",
            "IsClosed": false
        }"#;
        let record: ZoneRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.facility_id, Some(802));
        assert_eq!(record.total_capacity, Some(100));
    }

    #[test]
    fn test_zone_record_null_capacity() {
        let record: ZoneRecord =
            serde_json::from_str(r#"{"LocationId": 3903, "TotalCapacity": null}"#).unwrap();
        assert_eq!(record.capacity_or_default(), 1);
    }
}
