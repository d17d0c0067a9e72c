//! Hour buckets: the (date, hour) half of an aggregation key.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::fmt;

/// One clock hour of one facility-local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HourBucket {
    date: NaiveDate,
    hour: u32,
}

impl HourBucket {
    /// Returns `None` when `hour` is not 0-23.
    pub fn new(date: NaiveDate, hour: u32) -> Option<Self> {
        (hour < 24).then_some(Self { date, hour })
    }

    /// The bucket an instant falls in.
    pub fn containing(at: NaiveDateTime) -> Self {
        Self {
            date: at.date(),
            hour: at.hour(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// 0 = Monday ... 6 = Sunday.
    pub fn day_of_week(&self) -> u32 {
        self.date.weekday().num_days_from_monday()
    }

    /// First instant of the bucket, `HH:00:00`.
    pub fn start(&self) -> NaiveDateTime {
        // hour < 24 is guaranteed by construction
        self.date
            .and_time(NaiveTime::from_hms_opt(self.hour, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    /// First instant after the bucket. Readings are in the bucket iff
    /// `start() <= ts < end()`, which at second precision is `HH:00:00..=HH:59:59`.
    pub fn end(&self) -> NaiveDateTime {
        self.start() + Duration::hours(1)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start() && at < self.end()
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}:00", self.date.format("%Y-%m-%d"), self.hour)
    }
}
