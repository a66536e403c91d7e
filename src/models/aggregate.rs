use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::StationStats;

/// Key → statistics mapping produced by the aggregation stages.
///
/// The same type serves as a worker's per-batch partial result, a
/// reducer's accumulator and the final result of a run. Keys are the raw
/// station bytes; two keys are equal only if they are byte-for-byte equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub stations: FxHashMap<Vec<u8>, StationStats>,
    /// Lines dropped by the `skip` malformed-record policy.
    pub skipped_lines: u64,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stations: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            skipped_lines: 0,
        }
    }

    /// Fold one parsed record into the mapping.
    #[inline]
    pub fn record(&mut self, station: &[u8], value: i32) {
        // Look up by slice first so a known station costs no allocation.
        match self.stations.get_mut(station) {
            Some(stats) => stats.update(value),
            None => {
                self.stations
                    .insert(station.to_vec(), StationStats::new(value));
            }
        }
    }

    /// Fold a whole statistics record for `station` into the mapping.
    pub fn merge_station(&mut self, station: Vec<u8>, stats: StationStats) {
        self.stations
            .entry(station)
            .and_modify(|existing| existing.merge(&stats))
            .or_insert(stats);
    }

    /// Absorb another mapping, consuming it.
    pub fn merge(self, other: Aggregate) -> Aggregate {
        // Iterate over the smaller side.
        let (mut into, from) = if self.stations.len() >= other.stations.len() {
            (self, other)
        } else {
            (other, self)
        };
        into.skipped_lines += from.skipped_lines;
        for (station, stats) in from.stations {
            into.merge_station(station, stats);
        }
        into
    }

    pub fn get(&self, station: &[u8]) -> Option<&StationStats> {
        self.stations.get(station)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Sum of `count` over all stations.
    pub fn total_records(&self) -> u64 {
        self.stations.values().map(|s| s.count).sum()
    }

    /// Stations in byte order of their keys.
    pub fn sorted(&self) -> Vec<(&[u8], &StationStats)> {
        let mut pairs: Vec<_> = self
            .stations
            .iter()
            .map(|(name, stats)| (name.as_slice(), stats))
            .collect();
        pairs.sort_unstable_by_key(|&(name, _)| name);
        pairs
    }

    /// Presentation view keyed by station name. Invalid UTF-8 is replaced
    /// lossily, so distinct byte keys can in principle collide here.
    pub fn summaries(&self) -> BTreeMap<String, StationSummary> {
        self.stations
            .iter()
            .map(|(name, stats)| {
                (
                    String::from_utf8_lossy(name).into_owned(),
                    StationSummary::from(stats),
                )
            })
            .collect()
    }
}

/// Final per-station figures in presentation units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StationSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub count: u64,
}

impl From<&StationStats> for StationSummary {
    fn from(stats: &StationStats) -> Self {
        Self {
            min: stats.min_value(),
            mean: stats.mean(),
            max: stats.max_value(),
            count: stats.count,
        }
    }
}
