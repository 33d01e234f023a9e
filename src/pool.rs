//! Bounded worker pool for chunk work and background jobs.
//!

use anyhow::{bail, Result};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, warn};

/// Runs chunk workloads with at most `size` of them executing at once.
///
/// Chunk bodies are blocking file readers and run on tokio's blocking
/// threads, each holding one of `size` permits. Long-running job bodies (a
/// scan over the whole directory) are spawned as tracked async tasks that do
/// not hold a permit themselves, so a job waiting on its own chunks can never
/// starve the pool.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(size)),
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Whether the pool stopped accepting work.
    pub fn is_shut_down(&self) -> bool {
        self.inner.tracker.is_closed()
    }

    /// Token fired when the pool force-cancels outstanding work.
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Queues a blocking chunk body.
    ///
    /// The body receives the pool's cancellation token and should check it
    /// between records. The returned handle resolves to the body's result, or
    /// to an error if the pool was force-cancelled first.
    pub fn submit<F, T>(&self, work: F) -> Result<JoinHandle<Result<T>>>
    where
        F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_shut_down() {
            bail!("worker pool is shut down");
        }
        let permits = self.inner.permits.clone();
        let cancel = self.inner.cancel.clone();
        Ok(self.inner.tracker.spawn(async move {
            let _permit = tokio::select! {
                _ = cancel.cancelled() => bail!("chunk cancelled before it started"),
                permit = permits.acquire_owned() => permit?,
            };
            let token = cancel.clone();
            let body = tokio::task::spawn_blocking(move || work(&token));
            tokio::select! {
                _ = cancel.cancelled() => bail!("chunk cancelled"),
                joined = body => joined?,
            }
        }))
    }

    /// Spawns a tracked asynchronous job body.
    pub fn spawn<F>(&self, job: F) -> Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_shut_down() {
            bail!("worker pool is shut down");
        }
        Ok(self.inner.tracker.spawn(job))
    }

    /// Stops accepting work and waits up to `grace` for queued and running
    /// work to finish, then cancels whatever is left.
    ///
    /// Returns `true` if everything drained within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let tracker = &self.inner.tracker;
        tracker.close();
        info!(pending = tracker.len(), "draining worker pool");
        if tokio::time::timeout(grace, tracker.wait()).await.is_ok() {
            return true;
        }
        warn!(
            pending = tracker.len(),
            "worker pool did not drain within {:?}, cancelling remaining tasks", grace
        );
        self.inner.cancel.cancel();
        tracker.wait().await;
        false
    }
}
