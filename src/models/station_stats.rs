use serde::{Deserialize, Serialize};

use crate::utils::constants::VALUE_SCALE;

/// Running statistics for one station.
///
/// All values are fixed-point integers scaled by [`VALUE_SCALE`], so
/// `12.3` is stored as `123`. Accumulating integers keeps `sum` exact no
/// matter how many records are folded in or in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStats {
    pub min: i32,
    pub max: i32,
    pub sum: i64,
    pub count: u64,
}

impl StationStats {
    /// Statistics for a station that has seen exactly one value.
    pub fn new(value: i32) -> Self {
        Self {
            min: value,
            max: value,
            sum: value as i64,
            count: 1,
        }
    }

    /// Fold a single scaled value into the record.
    #[inline]
    pub fn update(&mut self, value: i32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value as i64;
        self.count += 1;
    }

    /// Combine two records for the same station.
    ///
    /// The operation is commutative and associative, which is what lets
    /// partial results be merged in any order.
    #[inline]
    pub fn merge(&mut self, other: &StationStats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn min_value(&self) -> f64 {
        self.min as f64 / VALUE_SCALE as f64
    }

    pub fn max_value(&self) -> f64 {
        self.max as f64 / VALUE_SCALE as f64
    }

    /// Mean rounded half away from zero to one decimal.
    pub fn mean(&self) -> f64 {
        let tenths = (self.sum as f64 / self.count as f64).round();
        // + 0.0 turns -0.0 into 0.0
        tenths / VALUE_SCALE as f64 + 0.0
    }
}
