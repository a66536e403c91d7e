use crate::error::{ProcessingError, Result};
use crate::models::Aggregate;
use crate::processors::aggregator::{AggregateStats, AggregatingWorker};
use crate::processors::chunk_splitter::{ChunkSplitter, LineBatch, SplitStats};
use crate::processors::reducer::{merge_accumulators, Reducer};
use crate::readers::ChunkReader;
use crate::settings::PipelineConfig;
use crate::utils::constants::DEFAULT_BUFFER_SIZE;
use crate::utils::progress::ProgressReporter;
use crossbeam::channel::{bounded, Sender};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use validator::Validate;

/// The streaming aggregation pipeline.
///
/// ```text
/// reader ─chunks─▶ splitters ─batches─▶ aggregators ─partials─▶ reducers ─▶ merge
/// ```
///
/// Every arrow is a bounded channel, so a slow stage makes the stages in
/// front of it wait instead of buffering without limit. A channel closes
/// when the last worker holding one of its senders exits; that is what
/// lets each stage finish only after everything upstream has finished.
///
/// A failing aggregator also raises a stop flag that the reader checks
/// before every chunk, so an aborted run does not read the rest of the
/// input.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Aggregate a file read through a buffered reader.
    pub fn run_file(&self, path: &Path, progress: Option<&ProgressReporter>) -> Result<Aggregate> {
        let file = File::open(path)?;
        let reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
        self.run(reader, progress)
    }

    /// Aggregate a file through a read-only memory map.
    ///
    /// This only swaps the I/O backend: chunks are still copied out of the
    /// map into owned buffers before they enter the pipeline.
    pub fn run_mmap(&self, path: &Path, progress: Option<&ProgressReporter>) -> Result<Aggregate> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_file() && metadata.len() == 0 {
            return self.run(std::io::empty(), progress);
        }
        // SAFETY: the map is read-only and lives until `run` returns. The
        // file must not be truncated by another process while mapped.
        let mmap = unsafe { Mmap::map(&file)? };
        self.run(&mmap[..], progress)
    }

    /// Aggregate every record of `input`.
    ///
    /// Fails with no result on the first read error, on a malformed record
    /// under the `abort` policy, or if a worker panics.
    pub fn run<R: BufRead>(
        &self,
        input: R,
        progress: Option<&ProgressReporter>,
    ) -> Result<Aggregate> {
        let config = &self.config;
        let started = Instant::now();
        let stop = AtomicBool::new(false);

        info!(
            chunk_size = config.chunk_size,
            batch_size = config.batch_size,
            splitters = config.splitter_workers,
            aggregators = config.aggregator_workers,
            reducers = config.reducer_workers,
            policy = ?config.malformed_policy,
            "Starting pipeline"
        );

        let outcome = crossbeam::scope(|scope| -> Result<Aggregate> {
            let (chunk_tx, chunk_rx) = bounded::<Vec<u8>>(config.chunk_queue_capacity);
            let (batch_tx, batch_rx) = bounded::<LineBatch>(config.batch_queue_capacity);
            let (partial_tx, partial_rx) = bounded::<Aggregate>(config.partial_queue_capacity);

            let splitter = ChunkSplitter::new(config.batch_size);
            let splitters: Vec<_> = (0..config.splitter_workers)
                .map(|id| {
                    let chunks = chunk_rx.clone();
                    let batches = batch_tx.clone();
                    scope.spawn(move |_| {
                        let stats = splitter.run(chunks, batches);
                        debug!(
                            worker = id,
                            chunks = stats.chunks,
                            lines = stats.lines,
                            batches = stats.batches,
                            "Splitter finished"
                        );
                        stats
                    })
                })
                .collect();

            let worker = AggregatingWorker::new(config.malformed_policy);
            let aggregators: Vec<_> = (0..config.aggregator_workers)
                .map(|id| {
                    let batches = batch_rx.clone();
                    let partials = partial_tx.clone();
                    let stop = &stop;
                    scope.spawn(move |_| {
                        let _guard = StopOnPanic(stop);
                        let result = worker.run(batches, partials);
                        match &result {
                            Ok(stats) => debug!(
                                worker = id,
                                batches = stats.batches,
                                records = stats.records,
                                skipped = stats.skipped_lines,
                                "Aggregator finished"
                            ),
                            Err(e) => {
                                stop.store(true, Ordering::Relaxed);
                                error!(worker = id, "Aggregator failed: {}", e)
                            }
                        }
                        result
                    })
                })
                .collect();

            let reducers: Vec<_> = (0..config.reducer_workers)
                .map(|id| {
                    let partials = partial_rx.clone();
                    scope.spawn(move |_| {
                        let (accumulator, absorbed) = Reducer::new().run(partials);
                        debug!(
                            worker = id,
                            partials = absorbed,
                            stations = accumulator.len(),
                            "Reducer finished"
                        );
                        accumulator
                    })
                })
                .collect();

            // Only the workers may keep channel ends alive
            drop(chunk_rx);
            drop(batch_tx);
            drop(batch_rx);
            drop(partial_tx);
            drop(partial_rx);

            let read_result = self.feed(input, chunk_tx, &stop, progress);

            let mut split_totals = SplitStats::default();
            for handle in splitters {
                let stats = handle.join().map_err(|_| ProcessingError::WorkerPanicked {
                    stage: "split",
                })?;
                split_totals.chunks += stats.chunks;
                split_totals.lines += stats.lines;
                split_totals.batches += stats.batches;
            }

            let mut aggregate_totals = AggregateStats::default();
            let mut first_error = None;
            for handle in aggregators {
                match handle.join() {
                    Ok(Ok(stats)) => {
                        aggregate_totals.batches += stats.batches;
                        aggregate_totals.records += stats.records;
                        aggregate_totals.skipped_lines += stats.skipped_lines;
                    }
                    Ok(Err(e)) => {
                        first_error.get_or_insert(e);
                    }
                    Err(_) => {
                        first_error.get_or_insert(ProcessingError::WorkerPanicked {
                            stage: "aggregate",
                        });
                    }
                }
            }

            let mut accumulators = Vec::with_capacity(config.reducer_workers);
            for handle in reducers {
                accumulators.push(handle.join().map_err(|_| ProcessingError::WorkerPanicked {
                    stage: "reduce",
                })?);
            }

            read_result?;
            if let Some(e) = first_error {
                return Err(e);
            }

            debug!(
                chunks = split_totals.chunks,
                lines = split_totals.lines,
                batches = aggregate_totals.batches,
                records = aggregate_totals.records,
                "All stages drained"
            );

            Ok(merge_accumulators(accumulators))
        })
        .map_err(|_| ProcessingError::WorkerPanicked { stage: "pipeline" })?;

        let aggregate = outcome?;

        info!(
            stations = aggregate.len(),
            records = aggregate.total_records(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        if aggregate.skipped_lines > 0 {
            warn!(skipped = aggregate.skipped_lines, "Skipped malformed lines");
        }

        Ok(aggregate)
    }

    /// Reader stage, run on the calling thread. Dropping `chunks` on return
    /// closes the chunk queue.
    fn feed<R: BufRead>(
        &self,
        input: R,
        chunks: Sender<Vec<u8>>,
        stop: &AtomicBool,
        progress: Option<&ProgressReporter>,
    ) -> Result<u64> {
        let mut reader = ChunkReader::with_chunk_size(input, self.config.chunk_size);
        let mut sent = 0u64;

        loop {
            if stop.load(Ordering::Relaxed) {
                debug!(bytes_read = reader.bytes_read(), "Worker failed, stopping reader");
                break;
            }

            let chunk = match reader.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    error!(bytes_read = reader.bytes_read(), "Read failed: {}", e);
                    return Err(e);
                }
            };

            let len = chunk.len() as u64;
            if chunks.send(chunk).is_err() {
                debug!("Chunk queue closed before end of input");
                break;
            }
            sent += 1;

            if let Some(p) = progress {
                p.increment(len);
            }
        }

        debug!(chunks = sent, bytes = reader.bytes_read(), "Reader finished");
        Ok(sent)
    }
}

/// Raises the stop flag if the owning worker thread unwinds.
struct StopOnPanic<'a>(&'a AtomicBool);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Relaxed);
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }
}
