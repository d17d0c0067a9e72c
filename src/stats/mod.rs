//! Collection statistics for the gym occupancy tracker.

pub mod collection;

// Re-export commonly used types
pub use collection::{
    create_shared_stats, create_shared_stats_with_persistence, CollectionStats,
    SharedCollectionStats, StatsSnapshot,
};
