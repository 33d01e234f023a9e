//! Named background scans that copy matching records into an output file.
//!

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, warn};

use crate::{
    chunk::plan_file,
    claims::FileClaims,
    jobs::{JobHandle, JobKind, JobRegistry, JobState},
    pool::WorkerPool,
    utils::list_station_files,
    workload::{scan_chunk, ScanFilter},
};

/// A validated SCAN command.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanRequest {
    /// Name the job is tracked under.
    pub job: String,
    pub filter: ScanFilter,
    /// File the matching lines are written to (truncated first).
    pub output: PathBuf,
}

/// What one scan run covered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files_scanned: usize,
    /// Files left out because another processor held them.
    pub files_skipped: usize,
    /// Files that could not be scanned.
    pub files_failed: usize,
    pub matches: usize,
    /// The worker pool shut down before every file was scanned.
    pub interrupted: bool,
}

#[derive(Clone)]
pub struct ScanService {
    directory: PathBuf,
    chunk_size: u64,
    claims: FileClaims,
    pool: WorkerPool,
    registry: JobRegistry,
}

impl ScanService {
    pub fn new(
        directory: impl Into<PathBuf>,
        chunk_size: u64,
        claims: FileClaims,
        pool: WorkerPool,
        registry: JobRegistry,
    ) -> Self {
        Self {
            directory: directory.into(),
            chunk_size,
            claims,
            pool,
            registry,
        }
    }

    /// Starts `request` in the background and registers it under its job
    /// name. Returns as soon as the job is queued.
    pub fn submit(&self, request: ScanRequest) -> Result<JobHandle> {
        let (handle, progress) = JobHandle::new(request.job.clone(), JobKind::Scan);
        let service = self.clone();
        let cancel = self.pool.cancellation();
        self.pool
            .spawn(async move {
                progress.set(JobState::Running);
                let name = &request.job;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!("Job {} cancelled", name);
                        progress.set(JobState::Cancelled);
                    }
                    result = service.run(&request) => match result {
                        Ok(summary) if summary.interrupted => {
                            warn!(
                                scanned = summary.files_scanned,
                                "Job {} interrupted by shutdown", name
                            );
                            progress.set(JobState::Cancelled);
                        }
                        Ok(summary) => {
                            info!(
                                scanned = summary.files_scanned,
                                skipped = summary.files_skipped,
                                failed = summary.files_failed,
                                matches = summary.matches,
                                "Job {} completed", name
                            );
                            progress.set(JobState::Completed);
                        }
                        Err(e) => {
                            error!("Error in job {}: {:#}", name, e);
                            progress.set(JobState::Failed);
                        }
                    }
                }
            })
            .with_context(|| format!("cannot start job {}", handle.name()))?;
        self.registry.register(handle.clone());
        info!(kind = ?handle.kind(), id = %handle.id(), "Job {} submitted", handle.name());
        Ok(handle)
    }

    /// Scans every station file that is not in use right now.
    ///
    /// Matches are written in directory order, and within a file in line
    /// order. A file that cannot be read is logged and left out; failing to
    /// write the output fails the whole run. If the pool shuts down mid-run the
    /// remaining files are not attempted and the summary is marked
    /// interrupted.
    pub async fn run(&self, request: &ScanRequest) -> Result<ScanSummary> {
        let output = tokio::fs::File::create(&request.output)
            .await
            .with_context(|| format!("cannot create output file {}", request.output.display()))?;
        let mut out = BufWriter::new(output);
        let mut summary = ScanSummary::default();

        for path in list_station_files(&self.directory)? {
            let Some(_claim) = self.claims.try_claim(&path) else {
                debug!(file = %path.display(), job = %request.job, "file in use, not scanned");
                summary.files_skipped += 1;
                continue;
            };
            match self.scan_file(&path, &request.filter, &mut out).await {
                Ok(matches) => {
                    summary.files_scanned += 1;
                    summary.matches += matches;
                }
                Err(e) => {
                    warn!("Error scanning {} for job {}: {:#}", path.display(), request.job, e);
                    summary.files_failed += 1;
                    if self.pool.is_shut_down() {
                        summary.interrupted = true;
                        break;
                    }
                }
            }
        }
        out.flush().await.context("failed to flush scan output")?;
        Ok(summary)
    }

    async fn scan_file<W>(&self, path: &Path, filter: &ScanFilter, out: &mut W) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let filter = *filter;
        let handles = plan_file(path, self.chunk_size)?
            .into_iter()
            .map(|chunk| self.pool.submit(move |cancel| scan_chunk(&chunk, &filter, cancel)))
            .collect::<Result<Vec<_>>>()?;

        let mut matches = 0;
        for handle in handles {
            match handle.await.map_err(anyhow::Error::from).and_then(|r| r) {
                Ok(lines) => {
                    for line in lines {
                        out.write_all(&line).await?;
                        out.write_all(b"\n").await?;
                        matches += 1;
                    }
                }
                Err(e) => warn!("Error during chunk scan of {}: {:#}", path.display(), e),
            }
        }
        Ok(matches)
    }
}
