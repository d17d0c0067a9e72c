//! Turning raw API records into readings for tracked, open zones.

use crate::collector::types::{Reading, ZoneRecord};
use crate::config::Config;
use crate::core::hours::OperatingHours;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Keeps records for tracked zones whose facility is open.
#[derive(Debug, Clone)]
pub struct ZoneFilter {
    tracked: HashSet<u32>,
    facility_names: HashMap<u32, String>,
    hours: OperatingHours,
}

impl ZoneFilter {
    pub fn new(config: &Config) -> Self {
        Self {
            tracked: config.zones.iter().map(|z| z.id).collect(),
            facility_names: config
                .facilities
                .iter()
                .map(|f| (f.id, f.name.clone()))
                .collect(),
            hours: OperatingHours::from_config(config),
        }
    }

    /// Readings for every tracked, open zone in `records`, in input order.
    pub fn filter(&self, records: &[ZoneRecord], at: NaiveDateTime) -> Vec<Reading> {
        records
            .iter()
            .filter_map(|record| self.accept(record, at))
            .collect()
    }

    fn accept(&self, record: &ZoneRecord, at: NaiveDateTime) -> Option<Reading> {
        let zone_id = record.location_id.filter(|id| self.tracked.contains(id))?;
        let facility_id = record.facility_id?;

        if !self.hours.is_open(facility_id, at) {
            debug!(
                "Skipping {} zone {zone_id} (closed at {})",
                self.facility_name(facility_id, record),
                at.format("%H:%M")
            );
            return None;
        }

        Some(Reading::new(
            at,
            facility_id,
            self.facility_name(facility_id, record),
            zone_id,
            record.location_name_or_default(),
            record.count_or_default(),
            record.capacity_or_default(),
        ))
    }

    fn facility_name<'a>(&'a self, facility_id: u32, record: &'a ZoneRecord) -> &'a str {
        self.facility_names
            .get(&facility_id)
            .map(String::as_str)
            .or(record.facility_name.as_deref())
            .unwrap_or("Unknown")
    }
}
