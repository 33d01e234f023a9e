//! Wires the components together and runs them until SHUTDOWN.
//!

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    claims::FileClaims,
    cmd::console::read_commands,
    config::Config,
    jobs::{self, load_saved_jobs, Command, Dispatch, JobQueue, JobReceiver, JobRegistry},
    monitor::DirectoryMonitor,
    pool::WorkerPool,
    processor::{FileProcessor, ProcessOutcome},
    report::ReportService,
    scan::ScanService,
    store::AggregateStore,
    utils::list_station_files,
};

/// One running aggregation system.
///
/// Owns the shared state and the services built on it, and executes the
/// commands drained from the job queue.
pub struct Runtime {
    config: Config,
    store: Arc<AggregateStore>,
    claims: FileClaims,
    pool: WorkerPool,
    registry: JobRegistry,
    processor: FileProcessor,
    scans: ScanService,
    reports: ReportService,
    queue: JobQueue,
    cancel: CancellationToken,
    shutting_down: AtomicBool,
}

impl Runtime {
    /// Builds the runtime for `config`.
    ///
    /// Fails if the configuration is invalid or the monitored directory
    /// cannot be read.
    pub fn new(mut config: Config) -> Result<(Arc<Runtime>, JobReceiver)> {
        config.validate()?;
        config.directory = config
            .directory
            .canonicalize()
            .with_context(|| format!("cannot open directory {}", config.directory.display()))?;
        list_station_files(&config.directory)?;

        let store = Arc::new(AggregateStore::new());
        let claims = FileClaims::new();
        let pool = WorkerPool::new(config.pool_size);
        let registry = JobRegistry::new();
        let processor = FileProcessor::new(
            store.clone(),
            claims.clone(),
            pool.clone(),
            config.chunk_size,
        );
        let scans = ScanService::new(
            &config.directory,
            config.chunk_size,
            claims.clone(),
            pool.clone(),
            registry.clone(),
        );
        let reports = ReportService::new(store.clone(), &config.export_path);
        let (queue, jobs) = jobs::channel();

        let runtime = Runtime {
            config,
            store,
            claims,
            pool,
            registry,
            processor,
            scans,
            reports,
            queue,
            cancel: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
        };
        Ok((Arc::new(runtime), jobs))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    pub fn claims(&self) -> &FileClaims {
        &self.claims
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Producer side of the job queue.
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Fires once shutdown begins.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts the directory monitor, the report scheduler and the command
    /// reader on `input`, then drains `jobs` on the current task until the
    /// queue is stopped.
    pub async fn run<R>(self: Arc<Self>, jobs: JobReceiver, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        if self.config.load_jobs {
            self.start(true)?;
        }

        let monitor = DirectoryMonitor::new(
            &self.config.directory,
            self.store.clone(),
            self.processor.clone(),
        );
        let mut roles = vec![
            tokio::spawn(monitor.run(self.config.poll_interval, self.cancel.clone())),
            tokio::spawn(
                self.reports
                    .clone()
                    .run_periodic(self.config.report_interval, self.cancel.clone()),
            ),
            tokio::spawn(read_commands(input, self.queue.clone(), self.cancel.clone())),
        ];

        jobs::drain(jobs, &*self).await;
        if !self.shutting_down.load(Ordering::SeqCst) {
            self.shutdown(false).await?;
        }

        let grace = self.config.shutdown_timeout;
        if tokio::time::timeout(grace, join_all(roles.iter_mut())).await.is_err() {
            warn!("Background tasks did not stop within {:?}, aborting them", grace);
            for role in &roles {
                role.abort();
            }
        }
        info!("System shutdown complete.");
        Ok(())
    }

    /// Saves job names if asked, stops every long-running loop and drains
    /// the worker pool. Later calls are no-ops.
    pub async fn shutdown(&self, save_jobs: bool) -> Result<()> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            info!("Shutdown already in progress");
            return Ok(());
        }
        info!("Initiating system shutdown...");
        let saved = if save_jobs {
            self.registry.save_unfinished(&self.config.jobs_path).map(|_| ())
        } else {
            Ok(())
        };
        self.cancel.cancel();
        // only fails if the worker already stopped
        let _ = self.queue.stop();
        if !self.pool.shutdown(self.config.shutdown_timeout).await {
            warn!("Forced shutdown of the worker pool");
        }
        saved
    }

    /// Handles START; with `load_jobs` the saved job names are read back and
    /// logged.
    pub fn start(&self, load_jobs: bool) -> Result<()> {
        if load_jobs {
            let names = load_saved_jobs(&self.config.jobs_path)?;
            info!("Loaded {} saved job name(s)", names.len());
        } else {
            info!("System started without loading saved jobs");
        }
        Ok(())
    }

    /// Resolves a PROCESS path against the monitored directory.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.directory.join(path)
        };
        path.canonicalize()
            .with_context(|| format!("cannot open {}", path.display()))
    }
}

#[async_trait]
impl Dispatch for Runtime {
    async fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::Scan(request) => {
                self.scans.submit(request)?;
            }
            Command::Status { job } => println!("{}", self.registry.describe(&job)),
            Command::Map => print!("{}", self.store.snapshot().render_map()),
            Command::ExportMap => self.reports.export().await?,
            Command::ProcessFile(path) => {
                let path = self.resolve(&path)?;
                let outcome = self.processor.process(&path).await?;
                if let ProcessOutcome::Processed { chunks, failed, stale } = outcome {
                    info!(chunks, failed, stale, "Processed {}", path.display());
                }
            }
            Command::Shutdown { save_jobs } => self.shutdown(save_jobs).await?,
            Command::Start { load_jobs } => self.start(load_jobs)?,
            Command::Stop => {}
        }
        Ok(())
    }
}
