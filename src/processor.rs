//! Turns one input file into merges on the aggregate store.
//!

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::{path::Path, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    chunk::plan_file, claims::FileClaims, pool::WorkerPool, store::AggregateStore,
    workload::aggregate_chunk,
};

/// What a call to [`FileProcessor::process`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Another processor or scan held the file; nothing was read.
    Skipped,
    /// The file was chunked and its chunks merged.
    Processed {
        chunks: usize,
        /// Chunks that failed to read and contributed nothing.
        failed: usize,
        /// Chunks whose merge was rejected because the store moved on to a
        /// newer epoch while they were running.
        stale: usize,
    },
}

/// Chunked, parallel file-to-aggregate pipeline.
#[derive(Clone)]
pub struct FileProcessor {
    store: Arc<AggregateStore>,
    claims: FileClaims,
    pool: WorkerPool,
    chunk_size: u64,
}

impl FileProcessor {
    pub fn new(
        store: Arc<AggregateStore>,
        claims: FileClaims,
        pool: WorkerPool,
        chunk_size: u64,
    ) -> Self {
        Self {
            store,
            claims,
            pool,
            chunk_size,
        }
    }

    /// Aggregates `path` into the store.
    ///
    /// At most one call per path runs at a time; a concurrent call returns
    /// [`ProcessOutcome::Skipped`] immediately. Chunks are merged as they
    /// complete. A chunk that fails is logged and dropped; the rest of the file
    /// still counts. The claim on `path` is released on every exit path.
    pub async fn process(&self, path: &Path) -> Result<ProcessOutcome> {
        let Some(_claim) = self.claims.try_claim(path) else {
            info!("File {} is already being processed, skipping.", path.display());
            return Ok(ProcessOutcome::Skipped);
        };
        let epoch = self.store.epoch();
        let chunks = plan_file(path, self.chunk_size)?;
        let total = chunks.len();
        debug!(file = %path.display(), chunks = total, epoch, "processing file");

        let mut pending = FuturesUnordered::new();
        for chunk in chunks {
            match self.pool.submit(move |cancel| aggregate_chunk(&chunk, cancel)) {
                Ok(handle) => pending.push(handle),
                Err(e) => {
                    warn!("Not processing the rest of {}: {}", path.display(), e);
                    break;
                }
            }
        }
        let mut failed = total - pending.len();

        let mut stale = 0;
        while let Some(joined) = pending.next().await {
            match joined.map_err(anyhow::Error::from).and_then(|r| r) {
                Ok(partial) => {
                    if !self.store.merge(epoch, &partial) {
                        stale += 1;
                    }
                }
                Err(e) => {
                    warn!("Error processing chunk of file {}: {:#}", path.display(), e);
                    failed += 1;
                }
            }
        }
        debug!(file = %path.display(), failed, stale, "file done");
        Ok(ProcessOutcome::Processed {
            chunks: total,
            failed,
            stale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bucket, BucketKey};
    use std::fs;
    use tempfile::TempDir;

    fn processor(chunk_size: u64) -> (FileProcessor, Arc<AggregateStore>, FileClaims) {
        let store = Arc::new(AggregateStore::new());
        let claims = FileClaims::new();
        let pool = WorkerPool::new(4);
        let proc = FileProcessor::new(store.clone(), claims.clone(), pool, chunk_size);
        (proc, store, claims)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn processes_file_and_releases_claim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "Station;Temp\nAachen;23.5\nberlin;-1.0\namsterdam;10.0\n").unwrap();
        let (proc, store, claims) = processor(8);

        let outcome = proc.process(&path).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Processed { failed: 0, stale: 0, .. }));
        let snap = store.snapshot();
        assert_eq!(snap.letter('a'), Bucket::new(2, 33.5));
        assert_eq!(snap.letter('b'), Bucket::new(1, -1.0));
        assert!(!claims.is_claimed(&path));
    }

    #[tokio::test]
    async fn skips_claimed_file_without_merging() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "Aachen;23.5\n").unwrap();
        let (proc, store, claims) = processor(1024);

        let held = claims.try_claim(&path).unwrap();
        assert_eq!(proc.process(&path).await.unwrap(), ProcessOutcome::Skipped);
        assert!(store.is_empty());
        drop(held);

        proc.process(&path).await.unwrap();
        assert_eq!(store.snapshot().get(BucketKey::Letter('a')), Bucket::new(1, 23.5));
    }

    #[tokio::test]
    async fn missing_file_is_an_error_and_releases_claim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.txt");
        let (proc, _store, claims) = processor(1024);
        assert!(proc.process(&path).await.is_err());
        assert!(!claims.is_claimed(&path));
    }

    #[tokio::test]
    async fn merges_from_a_cleared_epoch_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "a;1\nb;2\n").unwrap();
        let store = Arc::new(AggregateStore::new());
        let claims = FileClaims::new();
        let pool = WorkerPool::new(1);
        let proc = FileProcessor::new(store.clone(), claims.clone(), pool.clone(), 2);

        // Hold the only permit so the file's chunks queue up, then reset the
        // store while they wait.
        let (release, gate) = std::sync::mpsc::channel::<()>();
        let (started_tx, started) = tokio::sync::oneshot::channel();
        let blocker = pool
            .submit(move |_| {
                let _ = started_tx.send(());
                let _ = gate.recv();
                Ok(())
            })
            .unwrap();
        started.await.unwrap();

        let run = tokio::spawn({
            let proc = proc.clone();
            let path = path.clone();
            async move { proc.process(&path).await }
        });
        // the claim is taken in the same poll that captures the epoch
        while !claims.is_claimed(&path) {
            tokio::task::yield_now().await;
        }
        store.clear();
        release.send(()).unwrap();
        blocker.await.unwrap().unwrap();

        match run.await.unwrap().unwrap() {
            ProcessOutcome::Processed { chunks, stale, .. } => {
                assert_eq!(chunks, 4);
                assert_eq!(stale, 4);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(store.is_empty());
    }
}
