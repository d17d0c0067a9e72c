//! Zone data collection.
//!
//! This module fetches raw zone counts from the facility-count API and turns
//! them into validated readings for tracked zones of open facilities.

pub mod fetch;
pub mod filter;
pub mod types;

// Re-export commonly used types
pub use fetch::{parse_zone_records, FetchError, HttpZoneSource, ZoneSource};
pub use filter::ZoneFilter;
pub use types::{occupancy_percentage, Reading, ZoneRecord};
