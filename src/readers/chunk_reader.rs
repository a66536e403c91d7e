use crate::error::Result;
use crate::utils::constants::RECORD_TERMINATOR;
use std::io::{BufRead, Read};

/// Reads a byte stream in blocks of roughly `chunk_size` bytes that always
/// end on a record boundary.
///
/// Each chunk is a fixed-size block extended forward to the next `\n`, so a
/// chunk holds at most `chunk_size` plus one record. The last chunk may be
/// shorter and need not end with a newline.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    bytes_read: u64,
    finished: bool,
}

impl<R: BufRead> ChunkReader<R> {
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            bytes_read: 0,
            finished: false,
        }
    }

    /// Total bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Read the next chunk. `Ok(None)` once the stream is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        let mut chunk = Vec::with_capacity(self.chunk_size.saturating_add(128));
        let block = (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut chunk)?;

        if block < self.chunk_size {
            // End of stream inside this block
            self.finished = true;
        } else if chunk.last() != Some(&RECORD_TERMINATOR) {
            // Pull in the rest of the record that straddles the block end
            self.reader.read_until(RECORD_TERMINATOR, &mut chunk)?;
        }

        if chunk.is_empty() {
            self.finished = true;
            return Ok(None);
        }

        self.bytes_read += chunk.len() as u64;
        Ok(Some(chunk))
    }
}
