//! The set of files currently being read by a processor or a scan.
//!

use dashmap::DashSet;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Shared file-in-use set.
///
/// Cloning is cheap; clones refer to the same set.
#[derive(Clone, Debug, Default)]
pub struct FileClaims {
    in_use: Arc<DashSet<PathBuf>>,
}

impl FileClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims `path`.
    ///
    /// Returns [`None`] if someone else already holds it. The claim is released
    /// when the returned guard is dropped.
    pub fn try_claim(&self, path: &Path) -> Option<FileClaim> {
        if self.in_use.insert(path.to_path_buf()) {
            Some(FileClaim {
                claims: self.clone(),
                path: path.to_path_buf(),
            })
        } else {
            None
        }
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.in_use.contains(path)
    }

    pub fn len(&self) -> usize {
        self.in_use.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_use.is_empty()
    }
}

/// Exclusive hold on one file; released on drop.
#[derive(Debug)]
pub struct FileClaim {
    claims: FileClaims,
    path: PathBuf,
}

impl Drop for FileClaim {
    fn drop(&mut self) {
        self.claims.in_use.remove(&self.path);
    }
}
