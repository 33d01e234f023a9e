//! The FIFO command queue and its single consumer.
//!

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::Command;

/// Producer side of the job queue. Never blocks; cloning is cheap.
#[derive(Clone, Debug)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Command>,
}

/// Consumer side of the job queue, owned by the job worker.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
}

/// Creates an unbounded job queue.
pub fn channel() -> (JobQueue, JobReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobQueue { tx }, JobReceiver { rx })
}

impl JobReceiver {
    /// Next queued command; [`None`] once every producer is gone.
    pub async fn recv(&mut self) -> Option<Command> {
        self.rx.recv().await
    }
}

impl JobQueue {
    /// Appends `command` to the queue.
    ///
    /// Fails only if the worker has already stopped draining.
    pub fn submit(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|e| anyhow!("job queue is closed, dropping {}", e.0.name()))
    }

    /// Enqueues the poison pill.
    pub fn stop(&self) -> Result<()> {
        self.submit(Command::Stop)
    }
}

/// Executes commands taken off the queue.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, command: Command) -> Result<()>;
}

/// Drains `queue` strictly in order, one command at a time, until the poison
/// pill is dequeued or every producer is gone. Commands after the pill are
/// left unprocessed. A failing command is logged and does not stop the loop.
///
/// Returns the number of commands executed.
pub async fn drain<D: Dispatch + ?Sized>(mut queue: JobReceiver, handler: &D) -> usize {
    info!("Job processor started");
    let mut executed = 0;
    while let Some(command) = queue.recv().await {
        if matches!(command, Command::Stop) {
            info!("Received poison pill, job processor terminating...");
            break;
        }
        let name = command.name();
        debug!(command = name, "executing");
        if let Err(e) = handler.dispatch(command).await {
            error!("Error processing job {}: {:#}", name, e);
        }
        executed += 1;
    }
    info!("Job processor thread terminated.");
    executed
}
