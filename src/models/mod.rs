pub mod aggregate;
pub mod station_stats;

pub use aggregate::{Aggregate, StationSummary};
pub use station_stats::StationStats;
