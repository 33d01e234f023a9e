//! Runtime configuration.
//!

use anyhow::{bail, Result};
use serde::Serialize;
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_CHUNK_SIZE: u64 = 200 * 1024 * 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_EXPORT_FILE: &str = "meteo_log.csv";
pub const DEFAULT_JOBS_FILE: &str = "load_config";

/// Everything a [`Runtime`](crate::runtime::Runtime) needs to start.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Config {
    /// Directory whose `.txt`/`.csv` files are aggregated.
    pub directory: PathBuf,
    /// Maximum number of chunks processed at once.
    pub pool_size: usize,
    /// Upper bound on a chunk's byte length.
    pub chunk_size: u64,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    /// How long shutdown waits for queued work before cancelling it.
    pub shutdown_timeout: Duration,
    pub export_path: PathBuf,
    /// Where unfinished job names are saved on `SHUTDOWN --save-jobs`.
    pub jobs_path: PathBuf,
    /// Reload saved job names at startup.
    pub load_jobs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("test_data"),
            pool_size: DEFAULT_POOL_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            export_path: PathBuf::from(DEFAULT_EXPORT_FILE),
            jobs_path: PathBuf::from(DEFAULT_JOBS_FILE),
            load_jobs: false,
        }
    }
}

impl Config {
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            bail!("pool size must be at least 1");
        }
        if self.chunk_size == 0 {
            bail!("chunk size must be at least 1 byte");
        }
        if self.poll_interval.is_zero() || self.report_interval.is_zero() {
            bail!("poll and report intervals must be non-zero");
        }
        Ok(())
    }
}
