//! Chunk aggregation into worker-local partials.
//!

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

use crate::{chunk::Chunk, record::parse_record, Partial};

/// Folds every valid record owned by `chunk` into a fresh [`Partial`].
///
/// Invalid lines (including non UTF-8 ones) are skipped. Returns an error if
/// the file cannot be read or `cancel` fires mid-chunk.
pub fn aggregate_chunk(chunk: &Chunk, cancel: &CancellationToken) -> Result<Partial> {
    let mut partial = Partial::default();
    let mut lines = chunk.lines()?;
    while let Some(line) = lines.next_line()? {
        if cancel.is_cancelled() {
            bail!("aggregation of {} cancelled", chunk.path.display());
        }
        let Some(record) = std::str::from_utf8(line).ok().and_then(parse_record) else {
            continue;
        };
        partial.entry(record.bucket()).or_default().record(record.temperature);
    }
    Ok(partial)
}
