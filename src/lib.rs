//! A concurrent meteorological aggregation engine (lite).
//!
//! A directory of `<station>;<temperature>` files is split into byte-range
//! chunks, aggregated in parallel into per-letter station counts and
//! temperature sums, and kept in memory while an interactive command surface
//! queries, exports and selectively scans the same files.

use fnv::FnvHashMap;
use std::fmt;

pub mod chunk;
pub mod claims;
pub mod cmd;
pub mod config;
pub mod jobs;
pub mod logging;
pub mod monitor;
pub mod pool;
pub mod processor;
pub mod record;
pub mod report;
pub mod runtime;
pub mod scan;
pub mod store;
pub mod utils;
pub mod workload;

/////////////////////////////////////////////////////////////////////////////
// Aggregation types
/////////////////////////////////////////////////////////////////////////////

/// The key of an aggregate bucket.
///
/// Stations are bucketed by the lower-cased first character of their name.
/// Anything that does not lower-case to an ASCII letter `a`..=`z` (digits,
/// punctuation, accented letters) is folded into a single [`BucketKey::Other`]
/// bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    Letter(char),
    Other,
}

impl BucketKey {
    /// Buckets a station by an already lower-cased first character.
    pub fn from_lowercase(c: char) -> Self {
        if c.is_ascii_lowercase() {
            BucketKey::Letter(c)
        } else {
            BucketKey::Other
        }
    }

    /// The 26 letter buckets in export order.
    pub fn letters() -> impl Iterator<Item = BucketKey> {
        ('a'..='z').map(BucketKey::Letter)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Letter(c) => write!(f, "{}", c),
            BucketKey::Other => write!(f, "other"),
        }
    }
}

/// Station count and temperature sum for one bucket.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Bucket {
    /// Number of valid records merged into this bucket.
    pub count: u64,
    /// Arithmetic sum of their temperatures.
    pub sum: f64,
}

impl Bucket {
    /// Construct a bucket holding the given totals.
    pub fn new(count: u64, sum: f64) -> Self {
        Self { count, sum }
    }

    /// Account for a single reading.
    #[inline]
    pub fn record(&mut self, temperature: f64) {
        self.count += 1;
        self.sum += temperature;
    }

    /// Add another bucket's totals to this one.
    #[inline]
    pub fn absorb(&mut self, other: &Bucket) {
        self.count += other.count;
        self.sum += other.sum;
    }
}

/// A worker-local aggregate produced from a single chunk.
///
/// Partials are never shared; they are merged into the
/// [`store::AggregateStore`] once the chunk is done.
pub type Partial = FnvHashMap<BucketKey, Bucket>;
