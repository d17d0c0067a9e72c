//! Operating-hours gating.
//!
//! Decides whether a facility is open at a given facility-local instant.
//! Weekends are always closed; Friday has its own window; windows whose close
//! hour is 24 or later run past midnight.

use crate::config::{Config, OperatingWindow};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::collections::HashMap;

/// Weekly schedule for one facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilitySchedule {
    /// Monday through Thursday
    pub weekday: OperatingWindow,
    pub friday: OperatingWindow,
}

/// Answers "is this facility open at this instant?".
#[derive(Debug, Clone, Default)]
pub struct OperatingHours {
    schedules: HashMap<u32, FacilitySchedule>,
}

impl OperatingHours {
    pub fn from_config(config: &Config) -> Self {
        let schedules = config
            .facilities
            .iter()
            .map(|f| {
                (
                    f.id,
                    FacilitySchedule {
                        weekday: f.weekday,
                        friday: f.friday,
                    },
                )
            })
            .collect();
        Self { schedules }
    }

    /// Whether `facility_id` is open at `at`. Unknown facilities are closed.
    pub fn is_open(&self, facility_id: u32, at: NaiveDateTime) -> bool {
        let day = at.weekday().num_days_from_monday();
        if day >= 5 {
            return false;
        }

        let Some(schedule) = self.schedules.get(&facility_id) else {
            return false;
        };

        let window = if day == 4 {
            &schedule.friday
        } else {
            &schedule.weekday
        };

        let current = at.hour() * 60 + at.minute();
        window_contains(window, current)
    }
}

/// Half-open containment of `current` (minutes since midnight) in `window`.
///
/// For a window past midnight the early-morning tail is checked against the
/// same calendar day, so Monday 00:30 counts as open under a 5:15–25:00
/// weekday window.
fn window_contains(window: &OperatingWindow, current: u32) -> bool {
    let open = window.open_minutes();

    if window.wraps_midnight() {
        let close_after_midnight = (window.close_hour - 24) * 60 + window.close_minute;
        current >= open || current < close_after_midnight
    } else {
        open <= current && current < window.close_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BFIT_ID, JOHN_WOODEN_ID};
    use chrono::NaiveDate;

    // 2025-01-13 is a Monday.
    fn on(day_offset: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 13 + day_offset)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn hours() -> OperatingHours {
        OperatingHours::from_config(&Config::default())
    }

    #[test]
    fn test_weekend_closed_for_all_facilities() {
        let hours = hours();
        for facility in [JOHN_WOODEN_ID, BFIT_ID] {
            for day in [5, 6] {
                for h in 0..24 {
                    assert!(!hours.is_open(facility, on(day, h, 30, 0)));
                }
            }
        }
    }

    #[test]
    fn test_overnight_window() {
        let hours = hours();
        // Monday under JWC's 5:15 - 25:00 weekday window
        assert!(hours.is_open(JOHN_WOODEN_ID, on(0, 5, 15, 0)));
        assert!(hours.is_open(JOHN_WOODEN_ID, on(0, 23, 59, 0)));
        assert!(hours.is_open(JOHN_WOODEN_ID, on(0, 0, 30, 0)));
        assert!(!hours.is_open(JOHN_WOODEN_ID, on(0, 1, 0, 0)));
        assert!(!hours.is_open(JOHN_WOODEN_ID, on(0, 5, 0, 0)));
    }

    #[test]
    fn test_close_boundary_is_exclusive() {
        let hours = hours();
        assert!(!hours.is_open(JOHN_WOODEN_ID, on(1, 1, 0, 0)));
        assert!(hours.is_open(JOHN_WOODEN_ID, on(1, 0, 59, 59)));
    }

    #[test]
    fn test_friday_window() {
        let hours = hours();
        assert!(hours.is_open(JOHN_WOODEN_ID, on(4, 21, 59, 0)));
        assert!(!hours.is_open(JOHN_WOODEN_ID, on(4, 22, 0, 0)));
        assert!(!hours.is_open(BFIT_ID, on(4, 21, 0, 0)));
        assert!(hours.is_open(BFIT_ID, on(4, 6, 0, 0)));
    }

    #[test]
    fn test_midnight_close() {
        let hours = hours();
        // BFIT closes at 24:00, so midnight itself is closed.
        assert!(hours.is_open(BFIT_ID, on(2, 23, 59, 0)));
        assert!(!hours.is_open(BFIT_ID, on(2, 0, 0, 0)));
        assert!(!hours.is_open(BFIT_ID, on(2, 5, 59, 0)));
    }

    #[test]
    fn test_unknown_facility_closed() {
        assert!(!hours().is_open(999, on(0, 12, 0, 0)));
    }
}
