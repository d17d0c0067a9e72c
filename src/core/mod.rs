//! Core pipeline for the gym occupancy tracker.
//!
//! This module contains:
//! - Operating-hours gating
//! - Hour buckets and the aggregation engine
//! - The collection scheduler that ties fetching, storing and aggregating
//!   together on aligned clock ticks

pub mod aggregation;
pub mod bucket;
pub mod clock;
pub mod hours;
pub mod scheduler;

// Re-export commonly used types
pub use aggregation::{summarize, AggregationEngine, HourlyAverage, SweepSummary};
pub use bucket::HourBucket;
pub use clock::{Clock, LocalClock};
pub use hours::{FacilitySchedule, OperatingHours};
pub use scheduler::{
    wait_until_next_tick, CollectError, CollectionScheduler, SchedulerState, ShutdownSignal,
    TickReport,
};
