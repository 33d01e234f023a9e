use anyhow::Result;
use clap::Parser;
use meteolite::{cmd::meteo::Args, config::Config, logging::init_tracing, runtime::Runtime};
use std::time::Duration;
use tokio::io::BufReader;
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let config: Config = Args::parse().into();
    info!("Starting with configuration {}", serde_json::to_string(&config)?);

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = rt.block_on(async {
        let (runtime, jobs) = Runtime::new(config)?;
        runtime.run(jobs, BufReader::new(tokio::io::stdin())).await
    });
    // stdin is read on a blocking thread that never returns on its own
    rt.shutdown_timeout(Duration::from_secs(1));
    result
}
