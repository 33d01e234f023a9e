//! Byte-range chunking of input files.
//!
//! A file is cut into contiguous `[start, end)` ranges of at most
//! `chunk_size` bytes. Chunk boundaries ignore line structure; instead every
//! line is owned by the chunk that contains its first byte. A reader for a
//! chunk therefore
//!
//! * drops the tail of the line it lands in when `start > 0` (that line
//!   started in an earlier chunk), and
//! * keeps reading whole lines while its position is before `end`, which lets
//!   the last line run past `end`.
//!
//! Together these give exactly-once coverage of every line in the file for
//! any chunk size.

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader, Seek, SeekFrom},
    ops::Range,
    path::Path,
    sync::Arc,
};

use crate::utils::is_csv;

/// A contiguous byte range of one file, assigned to one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub path: Arc<Path>,
    pub start: u64,
    pub end: u64,
}

/// Splits `[0, file_size)` into ordered ranges of at most `chunk_size` bytes.
///
/// An empty file yields no ranges.
pub fn plan(file_size: u64, chunk_size: u64) -> Vec<Range<u64>> {
    let chunk_size = chunk_size.max(1);
    (0..file_size.div_ceil(chunk_size))
        .map(|i| {
            let start = i * chunk_size;
            start..(start + chunk_size).min(file_size)
        })
        .collect()
}

/// Stats `path` and plans its chunks.
pub fn plan_file(path: &Path, chunk_size: u64) -> Result<Vec<Chunk>> {
    let file_size = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    let path: Arc<Path> = Arc::from(path);
    Ok(plan(file_size, chunk_size)
        .into_iter()
        .map(|range| Chunk {
            path: path.clone(),
            start: range.start,
            end: range.end,
        })
        .collect())
}

impl Chunk {
    /// Opens an independent reader over the lines this chunk owns.
    pub fn lines(&self) -> Result<ChunkLines> {
        ChunkLines::open(self)
    }
}

/// Line reader for one [`Chunk`].
///
/// Yields each owned line without its terminator. For `.csv` files the
/// header line at offset 0 is skipped.
pub struct ChunkLines {
    reader: BufReader<File>,
    pos: u64,
    end: u64,
    skip_header: bool,
    buf: Vec<u8>,
}

impl ChunkLines {
    fn open(chunk: &Chunk) -> Result<Self> {
        let file = File::open(&chunk.path)
            .with_context(|| format!("failed to open {}", chunk.path.display()))?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut pos = 0;
        if chunk.start > 0 {
            // Step back one byte so a chunk that begins exactly on a line
            // start only discards the previous terminator.
            reader.seek(SeekFrom::Start(chunk.start - 1))?;
            let skipped = reader.read_until(b'\n', &mut buf)?;
            pos = chunk.start - 1 + skipped as u64;
        }
        Ok(Self {
            reader,
            pos,
            end: chunk.end,
            skip_header: chunk.start == 0 && is_csv(&chunk.path),
            buf,
        })
    }

    /// Returns the next owned line, or [`None`] once the chunk is exhausted.
    pub fn next_line(&mut self) -> Result<Option<&[u8]>> {
        loop {
            if self.pos >= self.end {
                return Ok(None);
            }
            self.buf.clear();
            let n = self.reader.read_until(b'\n', &mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.pos += n as u64;
            if std::mem::take(&mut self.skip_header) {
                continue;
            }
            let mut line = &self.buf[..];
            while let [rest @ .., b'\n' | b'\r'] = line {
                line = rest;
            }
            return Ok(Some(line));
        }
    }
}
