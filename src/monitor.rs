//! Polls the input directory and rebuilds the aggregate when it changes.
//!

use anyhow::{Context, Result};
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    processor::{FileProcessor, ProcessOutcome},
    store::AggregateStore,
    utils::list_station_files,
};

/// Watches one directory's station files by modification time.
///
/// Any added, modified or removed file resets the store and re-aggregates
/// every file in the directory. The freshness map is private to the monitor.
pub struct DirectoryMonitor {
    directory: PathBuf,
    store: Arc<AggregateStore>,
    processor: FileProcessor,
    freshness: HashMap<PathBuf, SystemTime>,
    primed: bool,
}

impl DirectoryMonitor {
    pub fn new(
        directory: impl Into<PathBuf>,
        store: Arc<AggregateStore>,
        processor: FileProcessor,
    ) -> Self {
        Self {
            directory: directory.into(),
            store,
            processor,
            freshness: HashMap::new(),
            primed: false,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Compares the directory against the freshness map and brings the map up
    /// to date. Returns whether anything was added, modified or removed.
    pub fn poll(&mut self) -> Result<bool> {
        let files = list_station_files(&self.directory)?;
        let mut changed = false;
        let mut present = HashSet::with_capacity(files.len());

        for path in files {
            let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    // removed between listing and stat; the next poll sees it gone
                    debug!(file = %path.display(), "cannot stat: {}", e);
                    continue;
                }
            };
            if self.freshness.get(&path) != Some(&modified) {
                info!("Change detected in file: {}", display_name(&path));
                self.freshness.insert(path.clone(), modified);
                changed = true;
            }
            present.insert(path);
        }

        let before = self.freshness.len();
        self.freshness.retain(|path, _| {
            let keep = present.contains(path);
            if !keep {
                info!("File deleted: {}", display_name(path));
            }
            keep
        });
        Ok(changed || self.freshness.len() != before)
    }

    /// Clears the store and aggregates every station file in the directory,
    /// one file after another. Returns the number of files processed.
    pub async fn rebuild(&self) -> Result<usize> {
        let epoch = self.store.clear();
        let files = list_station_files(&self.directory)
            .with_context(|| format!("cannot rebuild from {}", self.directory.display()))?;
        info!(epoch, files = files.len(), "rebuilding aggregate");

        let mut processed = 0;
        for path in files {
            match self.processor.process(&path).await {
                Ok(ProcessOutcome::Processed { .. }) => processed += 1,
                Ok(ProcessOutcome::Skipped) => {}
                Err(e) => warn!("Error processing file {}: {:#}", path.display(), e),
            }
        }
        Ok(processed)
    }

    /// One monitoring round: poll, then rebuild if anything changed. The
    /// first round always rebuilds. Returns whether a rebuild ran.
    pub async fn tick(&mut self) -> Result<bool> {
        let changed = self.poll()?;
        if !changed && self.primed {
            return Ok(false);
        }
        self.primed = true;
        self.rebuild().await?;
        Ok(true)
    }

    /// Runs [`DirectoryMonitor::tick`] every `interval` until `cancel` fires.
    /// Errors are logged and the loop keeps polling.
    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        info!("Monitoring directory: {}", self.directory().display());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.tick() => {
                    if let Err(e) = result {
                        error!("Error monitoring directory: {:#}", e);
                    }
                }
            }
        }
        info!("Directory monitoring terminated.");
    }
}

fn display_name(path: &Path) -> std::borrow::Cow<'_, str> {
    path.file_name().unwrap_or(path.as_os_str()).to_string_lossy()
}
