use crate::utils::constants::{DEFAULT_BATCH_SIZE, RECORD_TERMINATOR};
use crossbeam::channel::{Receiver, Sender};
use memchr::memchr;
use std::ops::Range;
use std::sync::Arc;

/// A bounded group of lines borrowed from one chunk.
///
/// Lines are stored as byte ranges into the shared chunk, so handing a
/// batch to another thread moves a reference count and a small vector, not
/// the line bytes themselves.
#[derive(Debug, Clone)]
pub struct LineBatch {
    chunk: Arc<Vec<u8>>,
    lines: Vec<Range<usize>>,
}

impl LineBatch {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines in source order, without terminators.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.lines.iter().map(move |range| &self.chunk[range.clone()])
    }
}

/// Counters reported by one splitter worker when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitStats {
    pub chunks: u64,
    pub lines: u64,
    pub batches: u64,
}

/// Cuts chunks into lines and groups them into batches of at most
/// `batch_size` lines.
///
/// `\n` ends a line and a trailing `\r` is dropped. Empty lines carry no
/// record and are skipped.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSplitter {
    batch_size: usize,
}

impl ChunkSplitter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Split `chunk` and pass every batch to `emit`, stopping early when
    /// `emit` returns `false`. Returns the lines and batches produced and
    /// whether `emit` accepted every batch.
    pub fn split_into<F>(&self, chunk: Vec<u8>, mut emit: F) -> (u64, u64, bool)
    where
        F: FnMut(LineBatch) -> bool,
    {
        let chunk = Arc::new(chunk);
        let len = chunk.len();
        let mut lines = Vec::with_capacity(self.batch_size);
        let mut line_count = 0u64;
        let mut batch_count = 0u64;
        let mut start = 0;

        while start < len {
            let end = memchr(RECORD_TERMINATOR, &chunk[start..])
                .map_or(len, |offset| start + offset);

            let mut line_end = end;
            if line_end > start && chunk[line_end - 1] == b'\r' {
                line_end -= 1;
            }

            if line_end > start {
                lines.push(start..line_end);
                line_count += 1;

                if lines.len() == self.batch_size {
                    let batch = LineBatch {
                        chunk: Arc::clone(&chunk),
                        lines: std::mem::replace(&mut lines, Vec::with_capacity(self.batch_size)),
                    };
                    batch_count += 1;
                    if !emit(batch) {
                        return (line_count, batch_count, false);
                    }
                }
            }

            start = end + 1;
        }

        if !lines.is_empty() {
            batch_count += 1;
            if !emit(LineBatch { chunk, lines }) {
                return (line_count, batch_count, false);
            }
        }

        (line_count, batch_count, true)
    }

    /// Split a chunk into a vector of batches.
    pub fn split(&self, chunk: Vec<u8>) -> Vec<LineBatch> {
        let mut batches = Vec::new();
        self.split_into(chunk, |batch| {
            batches.push(batch);
            true
        });
        batches
    }

    /// Worker loop: drain `chunks` until it is closed and empty, pushing
    /// batches into `batches`. Blocks while the outbound queue is full.
    pub fn run(&self, chunks: Receiver<Vec<u8>>, batches: Sender<LineBatch>) -> SplitStats {
        let mut stats = SplitStats::default();

        for chunk in chunks.iter() {
            stats.chunks += 1;
            let (lines, emitted, open) =
                self.split_into(chunk, |batch| batches.send(batch).is_ok());
            stats.lines += lines;
            stats.batches += emitted;
            if !open {
                // Every downstream worker is gone
                break;
            }
        }

        stats
    }
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
