//! Commands, the single-consumer job queue and named background jobs.
//!

use std::path::PathBuf;

use crate::scan::ScanRequest;

pub mod queue;
pub mod registry;

pub use queue::{channel, drain, Dispatch, JobQueue, JobReceiver};
pub use registry::{load_saved_jobs, JobHandle, JobKind, JobProgress, JobRegistry, JobState};

/// Everything the job worker can execute.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Start a named background scan.
    Scan(ScanRequest),
    /// Report the state of a named job.
    Status { job: String },
    /// Print the aggregate.
    Map,
    /// Write the aggregate to the export file.
    ExportMap,
    /// Aggregate one file now.
    ProcessFile(PathBuf),
    /// Stop the whole system, optionally saving unfinished job names.
    Shutdown { save_jobs: bool },
    /// Optionally reload saved job names.
    Start { load_jobs: bool },
    /// Poison pill: the worker stops draining when it dequeues this.
    Stop,
}

impl Command {
    /// Upper-case name, as typed on the console.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Scan(_) => "SCAN",
            Command::Status { .. } => "STATUS",
            Command::Map => "MAP",
            Command::ExportMap => "EXPORTMAP",
            Command::ProcessFile(_) => "PROCESS",
            Command::Shutdown { .. } => "SHUTDOWN",
            Command::Start { .. } => "START",
            Command::Stop => "STOP",
        }
    }
}
