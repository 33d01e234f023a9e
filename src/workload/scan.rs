//! Chunk scanning: the grep of this engine.
//!

use anyhow::{bail, Result};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::{
    chunk::Chunk,
    record::{parse_record, Record},
};

/// Selects records by station initial and an inclusive temperature range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanFilter {
    /// Lower-case initial the station name must start with.
    pub letter: char,
    pub min: f64,
    pub max: f64,
}

impl ScanFilter {
    #[inline]
    pub fn matches(&self, record: &Record<'_>) -> bool {
        record.first_letter() == self.letter
            && self.min <= record.temperature
            && record.temperature <= self.max
    }
}

/// Returns the original text of every line owned by `chunk` whose record
/// matches `filter`, in file order.
pub fn scan_chunk(
    chunk: &Chunk,
    filter: &ScanFilter,
    cancel: &CancellationToken,
) -> Result<Vec<Bytes>> {
    let mut matches = Vec::new();
    let mut lines = chunk.lines()?;
    while let Some(line) = lines.next_line()? {
        if cancel.is_cancelled() {
            bail!("scan of {} cancelled", chunk.path.display());
        }
        let hit = std::str::from_utf8(line)
            .ok()
            .and_then(parse_record)
            .map_or(false, |record| filter.matches(&record));
        if hit {
            matches.push(Bytes::copy_from_slice(line));
        }
    }
    Ok(matches)
}
