//! Facility-local wall clock.

use crate::config::TimeBasis;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Source of the current facility-local time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// Wall clock derived from the system UTC clock and a [`TimeBasis`].
#[derive(Debug, Clone, Copy)]
pub enum LocalClock {
    Fixed(FixedOffset),
    Zone(Tz),
}

impl LocalClock {
    /// Resolve a configured time basis. Returns `None` for an offset or zone
    /// name that cannot be represented.
    pub fn from_basis(basis: &TimeBasis) -> Option<Self> {
        match basis {
            TimeBasis::FixedOffset { utc_offset_hours } => {
                FixedOffset::east_opt(utc_offset_hours * 3600).map(LocalClock::Fixed)
            }
            TimeBasis::Zone { name } => name.parse::<Tz>().ok().map(LocalClock::Zone),
        }
    }

    /// Convert a UTC instant to naive facility-local time.
    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        match self {
            LocalClock::Fixed(offset) => utc.with_timezone(offset).naive_local(),
            LocalClock::Zone(tz) => utc.with_timezone(tz).naive_local(),
        }
    }
}

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        self.to_local(Utc::now())
    }
}
