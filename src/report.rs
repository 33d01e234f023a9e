//! CSV export of the aggregate, on demand and on a timer.
//!

use anyhow::{Context, Result};
use std::{fmt::Write, path::PathBuf, sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    store::{AggregateStore, Snapshot},
    BucketKey,
};

/// Header row of the export file.
pub const EXPORT_HEADER: &str = "Letter,Station count,Sum";

/// Renders the export file: the header, then one row per letter `a`..`z`.
pub fn render_csv(snapshot: &Snapshot) -> String {
    let mut out = String::with_capacity(27 * 16);
    out.push_str(EXPORT_HEADER);
    out.push('\n');
    for key in BucketKey::letters() {
        let bucket = snapshot.get(key);
        let _ = writeln!(out, "{},{},{:.1}", key, bucket.count, bucket.sum);
    }
    out
}

/// Writes [`render_csv`] output to the export file.
///
/// Manual and periodic exports share one lock so writes never interleave.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<AggregateStore>,
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl ReportService {
    pub fn new(store: Arc<AggregateStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Overwrites the export file with the current aggregate.
    pub async fn export(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            info!("Map is not yet available for export");
        }
        tokio::fs::write(&self.path, render_csv(&snapshot))
            .await
            .with_context(|| format!("failed to export map to {}", self.path.display()))?;
        info!("Map exported to {}", self.path.display());
        Ok(())
    }

    /// Exports every `period`, the first one a full period from now, until
    /// `cancel` fires. Failures are logged and retried next period.
    pub async fn run_periodic(self, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    info!("Generating periodic report...");
                    if let Err(e) = self.export().await {
                        error!("Error generating periodic report: {:#}", e);
                    }
                }
            }
        }
        info!("Report scheduler terminated.");
    }
}
