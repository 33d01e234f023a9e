use meteolite::{
    claims::FileClaims,
    pool::WorkerPool,
    processor::{FileProcessor, ProcessOutcome},
    record::parse_record,
    store::{AggregateStore, Snapshot},
    Bucket, Partial,
};
use std::{fs, path::Path, sync::Arc};
use tempfile::TempDir;

// Quarter-degree temperatures keep every sum exact regardless of merge order.
fn sample_lines() -> Vec<String> {
    let stations = [
        "Aachen", "berlin", "amsterdam", "Zurich", "7eleven", "Ørsted", "cairo", "Bern",
    ];
    (0..60)
        .map(|i| format!("{};{}", stations[i % stations.len()], (i as f64) * 0.25 - 5.0))
        .collect()
}

fn reference(lines: &[String]) -> Snapshot {
    let mut partial = Partial::default();
    for line in lines {
        if let Some(record) = parse_record(line) {
            partial
                .entry(record.bucket())
                .or_insert_with(Bucket::default)
                .record(record.temperature);
        }
    }
    let store = AggregateStore::new();
    store.merge(store.epoch(), &partial);
    store.snapshot()
}

async fn aggregate(path: &Path, chunk_size: u64) -> Snapshot {
    let store = Arc::new(AggregateStore::new());
    let pool = WorkerPool::new(4);
    let processor = FileProcessor::new(store.clone(), FileClaims::new(), pool, chunk_size);
    let outcome = processor.process(path).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Processed { failed: 0, stale: 0, .. }));
    store.snapshot()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_chunk_size_yields_the_same_aggregate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stations.txt");
    let lines = sample_lines();
    let content = lines.join("\n") + "\n";
    fs::write(&path, &content).unwrap();
    let expected = reference(&lines);

    for chunk_size in 1..=content.len() as u64 + 1 {
        assert_eq!(aggregate(&path, chunk_size).await, expected, "chunk size {chunk_size}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unterminated_last_line_still_counts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stations.txt");
    let lines = sample_lines();
    fs::write(&path, lines.join("\r\n")).unwrap();
    let expected = reference(&lines);
    for chunk_size in [1, 2, 3, 17, 64, 4096] {
        assert_eq!(aggregate(&path, chunk_size).await, expected, "chunk size {chunk_size}");
    }
}

#[tokio::test]
async fn csv_header_is_skipped_once() {
    let dir = TempDir::new().unwrap();
    let lines = sample_lines();
    let body = lines.join("\n") + "\n";
    let csv = dir.path().join("stations.csv");
    let txt = dir.path().join("stations.txt");
    fs::write(&csv, format!("alpha;1000\n{body}")).unwrap();
    fs::write(&txt, &body).unwrap();

    let big = body.len() as u64 * 2;
    assert_eq!(aggregate(&csv, big).await, aggregate(&txt, big).await);
    assert_eq!(aggregate(&csv, 5).await, reference(&lines));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_calls_on_one_path_count_it_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "alpha;1\nbeta;2\nalpine;3\n").unwrap();
    let store = Arc::new(AggregateStore::new());
    let claims = FileClaims::new();
    let pool = WorkerPool::new(1);
    let processor = FileProcessor::new(store.clone(), claims.clone(), pool.clone(), 4);

    // park the only permit so the first call holds its claim
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

    let first = tokio::spawn({
        let processor = processor.clone();
        let path = path.clone();
        async move { processor.process(&path).await }
    });
    while !claims.is_claimed(&path) {
        tokio::task::yield_now().await;
    }
    for _ in 0..4 {
        assert_eq!(processor.process(&path).await.unwrap(), ProcessOutcome::Skipped);
    }
    release.send(()).unwrap();
    blocker.await.unwrap().unwrap();
    assert!(matches!(first.await.unwrap().unwrap(), ProcessOutcome::Processed { .. }));

    let snap = store.snapshot();
    assert_eq!(snap.letter('a'), Bucket::new(2, 4.0));
    assert_eq!(snap.letter('b'), Bucket::new(1, 2.0));
    assert!(claims.is_empty());
}
