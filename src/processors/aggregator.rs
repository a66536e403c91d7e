use crate::error::{ProcessingError, Result};
use crate::models::Aggregate;
use crate::processors::chunk_splitter::LineBatch;
use crate::readers::line_parser::{LineParser, MalformedPolicy};
use crate::utils::constants::DEFAULT_STATION_CAPACITY;
use crossbeam::channel::{Receiver, Sender};

/// Counters reported by one aggregating worker when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub batches: u64,
    pub records: u64,
    pub skipped_lines: u64,
}

/// Turns line batches into partial mappings.
///
/// Each batch gets a fresh mapping that is handed downstream as soon as the
/// batch is done, so nothing is shared between workers and a worker never
/// holds more than one batch worth of stations.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregatingWorker {
    parser: LineParser,
}

impl AggregatingWorker {
    pub fn new(policy: MalformedPolicy) -> Self {
        Self {
            parser: LineParser::new(policy),
        }
    }

    /// Parse every line of `batch` and fold it into a new partial mapping.
    pub fn aggregate(&self, batch: &LineBatch) -> Result<Aggregate> {
        let mut partial = Aggregate::with_capacity(batch.len().min(DEFAULT_STATION_CAPACITY));

        for line in batch.iter() {
            match self.parser.parse(line) {
                Ok(Some((station, value))) => partial.record(station, value),
                Ok(None) => partial.skipped_lines += 1,
                Err(source) => {
                    return Err(ProcessingError::MalformedRecord {
                        line: String::from_utf8_lossy(line).into_owned(),
                        source,
                    })
                }
            }
        }

        Ok(partial)
    }

    /// Worker loop: one partial mapping per inbound batch until the batch
    /// queue is closed and drained.
    pub fn run(
        &self,
        batches: Receiver<LineBatch>,
        partials: Sender<Aggregate>,
    ) -> Result<AggregateStats> {
        let mut stats = AggregateStats::default();

        for batch in batches.iter() {
            let partial = self.aggregate(&batch)?;
            stats.batches += 1;
            stats.records += partial.total_records();
            stats.skipped_lines += partial.skipped_lines;

            if partials.send(partial).is_err() {
                break;
            }
        }

        Ok(stats)
    }
}
