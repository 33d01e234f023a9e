use meteolite::{
    config::Config,
    jobs::{Command, JobState},
    runtime::Runtime,
    scan::ScanRequest,
    workload::ScanFilter,
};
use std::{fs, path::Path, time::Duration};
use tempfile::TempDir;
use tokio::io::{duplex, BufReader};

const STATIONS_CSV: &str = "Station;Temp\nAachen;23.5\nberlin;-1.0\namsterdam;10.0\n";

fn config(data: &Path, out: &Path) -> Config {
    let mut config = Config::with_directory(data);
    config.pool_size = 1;
    config.chunk_size = 8;
    config.poll_interval = Duration::from_millis(20);
    config.export_path = out.join("meteo_log.csv");
    config.jobs_path = out.join("load_config");
    config.shutdown_timeout = Duration::from_millis(200);
    config
}

fn scan(job: &str, output: &Path) -> Command {
    Command::Scan(ScanRequest {
        job: job.into(),
        filter: ScanFilter {
            letter: 'a',
            min: 0.0,
            max: 25.0,
        },
        output: output.to_path_buf(),
    })
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn monitor_builds_and_rebuilds_the_aggregate() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(data.path().join("a.csv"), STATIONS_CSV).unwrap();
    fs::write(data.path().join("c.txt"), "cairo;30.0\n").unwrap();
    let (runtime, jobs) = Runtime::new(config(data.path(), out.path())).unwrap();
    let (_keep_open, console) = duplex(64);
    let task = tokio::spawn(runtime.clone().run(jobs, BufReader::new(console)));

    let store = runtime.store().clone();
    wait_for(|| store.snapshot().total_count() == 4).await;
    let map = store.snapshot().render_map();
    assert!(map.starts_with("a: 2 - 33.5 | b: 1 - -1.0\nc: 1 - 30.0 | d: 0 - 0.0\n"));

    fs::remove_file(data.path().join("c.txt")).unwrap();
    wait_for(|| {
        let snap = store.snapshot();
        snap.letter('c').count == 0 && snap.total_count() == 3
    })
    .await;

    runtime.queue().submit(Command::Shutdown { save_jobs: false }).unwrap();
    task.await.unwrap().unwrap();
    assert!(!runtime.config().jobs_path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_saves_only_unfinished_jobs() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(data.path().join("a.csv"), STATIONS_CSV).unwrap();
    let (runtime, jobs) = Runtime::new(config(data.path(), out.path())).unwrap();
    let (_keep_open, console) = duplex(64);
    let task = tokio::spawn(runtime.clone().run(jobs, BufReader::new(console)));

    // let the first rebuild release its claim so scans see the file
    let (store, claims) = (runtime.store().clone(), runtime.claims().clone());
    wait_for(|| store.snapshot().total_count() == 3 && claims.is_empty()).await;

    let registry = runtime.registry().clone();
    let finished = out.path().join("done.txt");
    runtime.queue().submit(scan("done", &finished)).unwrap();
    wait_for(|| registry.status("done") == Some(JobState::Completed)).await;
    assert_eq!(fs::read_to_string(&finished).unwrap(), "Aachen;23.5\namsterdam;10.0\n");

    // hold the only permit so the next scan cannot finish
    let (release, gate) = std::sync::mpsc::channel::<()>();
    let (started_tx, started) = tokio::sync::oneshot::channel();
    runtime
        .pool()
        .submit(move |_| {
            let _ = started_tx.send(());
            let _ = gate.recv();
            Ok(())
        })
        .unwrap();
    started.await.unwrap();

    runtime.queue().submit(scan("stuck", &out.path().join("stuck.txt"))).unwrap();
    wait_for(|| registry.status("stuck") == Some(JobState::Running)).await;
    runtime.queue().submit(Command::Shutdown { save_jobs: true }).unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(fs::read_to_string(&runtime.config().jobs_path).unwrap(), "stuck\n");
    assert_eq!(registry.status("stuck"), Some(JobState::Cancelled));
    assert!(runtime.pool().is_shut_down());
    assert!(runtime.queue().submit(Command::Map).is_err());
    drop(release);
}

#[tokio::test]
async fn start_with_load_jobs_reads_saved_names() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let mut config = config(data.path(), out.path());
    config.load_jobs = true;
    fs::write(&config.jobs_path, "first\nsecond\n").unwrap();
    let (runtime, jobs) = Runtime::new(config).unwrap();

    // end of input shuts the system down
    let console: &'static [u8] = b"STATUS -j first\n";
    runtime.clone().run(jobs, console).await.unwrap();
    assert_eq!(runtime.registry().status("first"), None);
    assert!(runtime.cancellation().is_cancelled());
}
