//! Named background jobs and their persisted names.
//!

use anyhow::{Context, Result};
use dashmap::DashMap;
use itertools::Itertools;
use std::{fmt, fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle of a background job.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job reached a terminal state.
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobKind {
    Scan,
}

/// Read side of a job: what STATUS looks at.
#[derive(Clone, Debug)]
pub struct JobHandle {
    id: Uuid,
    name: String,
    kind: JobKind,
    state: watch::Receiver<JobState>,
}

/// Write side of a job, owned by the task running it.
///
/// Dropping it before the job finished (the task was aborted) marks the job
/// [`JobState::Cancelled`].
#[derive(Debug)]
pub struct JobProgress {
    state: watch::Sender<JobState>,
}

impl JobHandle {
    /// Creates a [`JobState::Pending`] job.
    pub fn new(name: impl Into<String>, kind: JobKind) -> (JobHandle, JobProgress) {
        let (tx, rx) = watch::channel(JobState::Pending);
        let handle = JobHandle {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            state: rx,
        };
        (handle, JobProgress { state: tx })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Waits until the job reaches a terminal state and returns it.
    pub async fn finished(&self) -> JobState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(|state| state.is_finished()).await {
            return *state;
        }
        // sender gone; its Drop already published the final state
        let state = *rx.borrow();
        state
    }
}

impl JobProgress {
    pub fn set(&self, state: JobState) {
        self.state.send_replace(state);
    }
}

impl Drop for JobProgress {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            if state.is_finished() {
                false
            } else {
                *state = JobState::Cancelled;
                true
            }
        });
    }
}

/// Run-lifetime map from job name to its latest handle.
#[derive(Clone, Debug, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<String, JobHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `handle` under its name. A previous job with the same name is
    /// replaced (and returned); it keeps running but is no longer tracked.
    pub fn register(&self, handle: JobHandle) -> Option<JobHandle> {
        let previous = self.jobs.insert(handle.name().to_string(), handle);
        if let Some(prev) = &previous {
            warn!(
                job = prev.name(),
                id = %prev.id(),
                "job name reused, previous job no longer tracked"
            );
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<JobHandle> {
        self.jobs.get(name).map(|entry| entry.value().clone())
    }

    /// Current state of the named job, [`None`] if unknown.
    pub fn status(&self, name: &str) -> Option<JobState> {
        self.jobs.get(name).map(|entry| entry.state())
    }

    /// The STATUS command's answer.
    pub fn describe(&self, name: &str) -> String {
        match self.status(name) {
            Some(state) => format!("{} is {}", name, state),
            None => format!("{} is unknown", name),
        }
    }

    /// Names of jobs that are still pending or running, sorted.
    pub fn unfinished(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|entry| !entry.state().is_finished())
            .map(|entry| entry.key().clone())
            .sorted()
            .collect()
    }

    /// Writes the names of unfinished jobs to `path`, one per line, replacing
    /// its contents. Returns how many names were written.
    pub fn save_unfinished(&self, path: &Path) -> Result<usize> {
        let names = self.unfinished();
        let mut content = names.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(path, content)
            .with_context(|| format!("failed to save jobs to {}", path.display()))?;
        info!("Unexecuted jobs saved to {}", path.display());
        Ok(names.len())
    }
}

/// Reads job names saved by [`JobRegistry::save_unfinished`].
///
/// Only names are persisted; the jobs themselves are not re-run. A missing
/// file yields an empty list.
pub fn load_saved_jobs(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No saved jobs found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    let names: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    for name in &names {
        info!("Loaded job: {}", name);
    }
    Ok(names)
}
