//! The shared in-memory aggregate.
//!

use dashmap::DashMap;
use itertools::Itertools;
use std::{
    collections::BTreeMap,
    fmt::Write,
    sync::{PoisonError, RwLock},
};
use tracing::debug;

use crate::{Bucket, BucketKey, Partial};

/// Identifies one aggregation cycle between two resets of the store.
pub type Epoch = u64;

/// Concurrent per-letter `(count, sum)` aggregate.
///
/// Each merge updates every bucket it touches under that bucket's entry lock,
/// so readers only ever see whole per-bucket updates. Merges are tagged with
/// the [`Epoch`] they were computed for; once [`AggregateStore::clear`] starts
/// a new epoch, merges carrying an older one are rejected instead of leaking
/// stale totals into the rebuilt aggregate.
#[derive(Debug, Default)]
pub struct AggregateStore {
    buckets: DashMap<BucketKey, Bucket>,
    // Shared by merges and snapshots, exclusive for clear.
    epoch: RwLock<Epoch>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current epoch. Callers capture it before computing partials.
    pub fn epoch(&self) -> Epoch {
        *self.epoch.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds every bucket of `partial` into the store.
    ///
    /// Returns `false`, without touching the store, if `epoch` is no longer
    /// current.
    pub fn merge(&self, epoch: Epoch, partial: &Partial) -> bool {
        let current = self.epoch.read().unwrap_or_else(PoisonError::into_inner);
        if *current != epoch {
            debug!(stale = epoch, current = *current, "dropping merge from a previous epoch");
            return false;
        }
        for (key, delta) in partial {
            self.buckets.entry(*key).or_default().absorb(delta);
        }
        true
    }

    /// Empties the store and starts a new epoch, which is returned.
    pub fn clear(&self) -> Epoch {
        let mut epoch = self.epoch.write().unwrap_or_else(PoisonError::into_inner);
        self.buckets.clear();
        *epoch += 1;
        *epoch
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// A point-in-time copy of all buckets.
    pub fn snapshot(&self) -> Snapshot {
        let _epoch = self.epoch.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            buckets: self
                .buckets
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
        }
    }
}

/// Immutable copy of the aggregate, ordered by bucket key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    buckets: BTreeMap<BucketKey, Bucket>,
}

impl Snapshot {
    /// The totals for `key`; zero if nothing was recorded.
    pub fn get(&self, key: BucketKey) -> Bucket {
        self.buckets.get(&key).copied().unwrap_or_default()
    }

    /// Shorthand for `get(BucketKey::Letter(letter))`.
    pub fn letter(&self, letter: char) -> Bucket {
        self.get(BucketKey::Letter(letter))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.buckets.values().map(|b| b.count).sum()
    }

    /// Human readable table used by the MAP command: two letters per row,
    /// `a`..`z`, followed by the `other` bucket when it is populated.
    pub fn render_map(&self) -> String {
        if self.is_empty() {
            return "Map is not yet available\n".to_string();
        }
        let mut out = String::new();
        for (left, right) in ('a'..='z').tuples() {
            let (l, r) = (self.letter(left), self.letter(right));
            let _ = writeln!(
                out,
                "{}: {} - {:.1} | {}: {} - {:.1}",
                left, l.count, l.sum, right, r.count, r.sum
            );
        }
        let other = self.get(BucketKey::Other);
        if other.count > 0 {
            let _ = writeln!(out, "other: {} - {:.1}", other.count, other.sum);
        }
        out
    }
}
