//! Parsing of single `<station>;<temperature>` records.
//!

use crate::BucketKey;

/// Separates the station name from the temperature.
pub const FIELD_DELIMITER: char = ';';

/// A valid record borrowed from an input line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Record<'a> {
    /// Station name, trimmed and never empty.
    pub station: &'a str,
    /// Temperature reading.
    pub temperature: f64,
}

impl Record<'_> {
    /// The lower-cased first character of the station name.
    pub fn first_letter(&self) -> char {
        // station is non-empty by construction
        let first = self.station.chars().next().unwrap_or_default();
        first.to_lowercase().next().unwrap_or(first)
    }

    /// The aggregate bucket this record belongs to.
    pub fn bucket(&self) -> BucketKey {
        BucketKey::from_lowercase(self.first_letter())
    }
}

/// Parses one line (with or without its terminator) into a [`Record`].
///
/// Returns [`None`] for lines that are not valid records: no delimiter, a
/// delimiter in the first or last position, a blank station name, or a
/// temperature that is not a finite floating-point number. Malformed lines are
/// not errors; callers skip them.
pub fn parse_record(line: &str) -> Option<Record<'_>> {
    let line = line.trim_end_matches(&['\n', '\r'][..]);
    let idx = line.find(FIELD_DELIMITER)?;
    if idx == 0 || idx == line.len() - FIELD_DELIMITER.len_utf8() {
        return None;
    }
    let station = line[..idx].trim();
    if station.is_empty() {
        return None;
    }
    let temperature: f64 = line[idx + FIELD_DELIMITER.len_utf8()..].trim().parse().ok()?;
    if !temperature.is_finite() {
        return None;
    }
    Some(Record {
        station,
        temperature,
    })
}
