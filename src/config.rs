//! Configuration for the gym occupancy tracker.
//!
//! Tracked zones, facility schedules and display names are held in one
//! immutable [`Config`] value that is handed to the components that need it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default GoBoard facility-count endpoint.
pub const DEFAULT_API_URL: &str = "https://goboardapi.azurewebsites.net/api/FacilityCount/GetCountsByAccount?AccountAPIKey=73829a91-48cb-4b7b-bd0b-8cf4134c04cd";

/// John Wooden Center.
pub const JOHN_WOODEN_ID: u32 = 802;
/// Bruin Fitness Center.
pub const BFIT_ID: u32 = 803;

/// Main configuration for the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Facility-count API endpoint
    pub api_url: String,

    /// Upper bound on a single fetch
    #[serde(with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Collection interval; ticks land on multiples of this within the hour
    pub collection_interval_minutes: u32,

    /// How wall-clock time at the facilities is derived from UTC
    pub time_basis: TimeBasis,

    /// Facilities and their operating schedules
    pub facilities: Vec<FacilityConfig>,

    /// Zones whose readings are kept
    pub zones: Vec<TrackedZone>,

    /// SQLite database holding readings and hourly averages
    pub database_path: PathBuf,

    /// Directory for CSV exports
    pub export_path: PathBuf,

    /// Directory for collection statistics
    pub data_path: PathBuf,

    /// Aggregate any pending hours before the collection loop starts
    pub aggregate_on_startup: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gym-occupancy-tracker");

        Self {
            api_url: DEFAULT_API_URL.to_string(),
            fetch_timeout: Duration::from_secs(30),
            collection_interval_minutes: 15,
            time_basis: TimeBasis::default(),
            facilities: vec![
                FacilityConfig {
                    id: JOHN_WOODEN_ID,
                    name: "JWC".to_string(),
                    weekday: OperatingWindow::new(5, 15, 25, 0),
                    friday: OperatingWindow::new(5, 15, 22, 0),
                },
                FacilityConfig {
                    id: BFIT_ID,
                    name: "BFIT".to_string(),
                    weekday: OperatingWindow::new(6, 0, 24, 0),
                    friday: OperatingWindow::new(6, 0, 21, 0),
                },
            ],
            zones: vec![
                TrackedZone::new(3903, "Free Weight Zone"),
                TrackedZone::new(4339, "Advanced Circuit Zone"),
                TrackedZone::new(3902, "Novice Circuit Zone"),
                TrackedZone::new(4009, "Free Weight & Squat Zones"),
                TrackedZone::new(4010, "Cable, Synergy Zones"),
                TrackedZone::new(4011, "Selectorized Zone"),
            ],
            database_path: data_dir.join("gym_data.db"),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            aggregate_on_startup: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gym-occupancy-tracker")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Check the configuration for values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=60).contains(&self.collection_interval_minutes) {
            return Err(ConfigError::Invalid(format!(
                "collection interval must be 1..=60 minutes, got {}",
                self.collection_interval_minutes
            )));
        }

        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("fetch timeout must be non-zero".into()));
        }

        self.time_basis.validate()?;

        let mut facility_ids = HashSet::new();
        for facility in &self.facilities {
            if !facility_ids.insert(facility.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate facility id {}",
                    facility.id
                )));
            }
            facility
                .weekday
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("{} weekday: {e}", facility.name)))?;
            facility
                .friday
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("{} friday: {e}", facility.name)))?;
        }

        let mut zone_ids = HashSet::new();
        for zone in &self.zones {
            if !zone_ids.insert(zone.id) {
                return Err(ConfigError::Invalid(format!("duplicate zone id {}", zone.id)));
            }
        }

        Ok(())
    }

    /// Short display name for a facility, if configured.
    pub fn facility_name(&self, facility_id: u32) -> Option<&str> {
        self.facilities
            .iter()
            .find(|f| f.id == facility_id)
            .map(|f| f.name.as_str())
    }

    /// Look up a tracked zone by id.
    pub fn zone(&self, zone_id: u32) -> Option<&TrackedZone> {
        self.zones.iter().find(|z| z.id == zone_id)
    }
}

/// Opening and closing time for one kind of day.
///
/// `close_hour` may exceed 23 to express a close after midnight: 25:00 is
/// 1:00 AM the following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingWindow {
    pub open_hour: u32,
    pub open_minute: u32,
    pub close_hour: u32,
    pub close_minute: u32,
}

impl OperatingWindow {
    pub const fn new(open_hour: u32, open_minute: u32, close_hour: u32, close_minute: u32) -> Self {
        Self {
            open_hour,
            open_minute,
            close_hour,
            close_minute,
        }
    }

    /// Opening time in minutes since midnight.
    pub fn open_minutes(&self) -> u32 {
        self.open_hour * 60 + self.open_minute
    }

    /// Closing time in minutes since the midnight that starts the window.
    pub fn close_minutes(&self) -> u32 {
        self.close_hour * 60 + self.close_minute
    }

    /// Whether the window runs past midnight.
    pub fn wraps_midnight(&self) -> bool {
        self.close_hour >= 24
    }

    fn validate(&self) -> Result<(), String> {
        if self.open_minute >= 60 || self.close_minute >= 60 {
            return Err("minutes must be below 60".into());
        }
        if self.open_hour >= 24 {
            return Err(format!("open hour {} is not a time of day", self.open_hour));
        }
        if self.close_hour > 47 {
            return Err(format!("close hour {} wraps more than one day", self.close_hour));
        }
        if self.close_minutes() <= self.open_minutes() {
            return Err("close must come after open".into());
        }
        Ok(())
    }
}

/// A facility and its weekly schedule. Weekends are always closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub id: u32,
    /// Short display name, e.g. "JWC"
    pub name: String,
    /// Monday through Thursday
    pub weekday: OperatingWindow,
    pub friday: OperatingWindow,
}

/// A zone whose occupancy is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedZone {
    pub id: u32,
    pub name: String,
}

impl TrackedZone {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// How facility-local wall-clock time is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeBasis {
    /// A fixed offset from UTC with no daylight-saving adjustment.
    FixedOffset { utc_offset_hours: i32 },
    /// An IANA time zone such as `America/Los_Angeles`.
    Zone { name: String },
}

impl Default for TimeBasis {
    fn default() -> Self {
        // Pacific Standard Time year-round.
        TimeBasis::FixedOffset {
            utc_offset_hours: -8,
        }
    }
}

impl TimeBasis {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            TimeBasis::FixedOffset { utc_offset_hours } => {
                if !(-23..=23).contains(utc_offset_hours) {
                    return Err(ConfigError::Invalid(format!(
                        "UTC offset {utc_offset_hours}h is out of range"
                    )));
                }
            }
            TimeBasis::Zone { name } => {
                name.parse::<chrono_tz::Tz>()
                    .map_err(|_| ConfigError::Invalid(format!("unknown time zone '{name}'")))?;
            }
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
