use clap::Parser;
use std::{path::PathBuf, time::Duration};

use crate::config::{self, Config};

/// Aggregate meteorological station files and answer commands about them.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding the station files
    #[clap(default_value = "test_data")]
    pub directory: PathBuf,

    /// Number of chunks processed in parallel
    #[clap(short, long, default_value_t = config::DEFAULT_POOL_SIZE)]
    pub pool_size: usize,

    /// Chunk size in bytes
    #[clap(short, long, default_value_t = config::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Seconds between directory polls
    #[clap(long, default_value_t = config::DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_secs: u64,

    /// Seconds between periodic exports
    #[clap(long, default_value_t = config::DEFAULT_REPORT_INTERVAL.as_secs())]
    pub report_secs: u64,

    /// Seconds shutdown waits for running work
    #[clap(long, default_value_t = config::DEFAULT_SHUTDOWN_TIMEOUT.as_secs())]
    pub shutdown_secs: u64,

    /// File the map is exported to
    #[clap(short, long, default_value = config::DEFAULT_EXPORT_FILE)]
    pub export: PathBuf,

    /// File unfinished job names are saved to
    #[clap(short, long, default_value = config::DEFAULT_JOBS_FILE)]
    pub jobs_file: PathBuf,

    /// Reload saved job names at startup
    #[clap(short, long)]
    pub load_jobs: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            directory: args.directory,
            pool_size: args.pool_size,
            chunk_size: args.chunk_size,
            poll_interval: Duration::from_secs(args.poll_secs),
            report_interval: Duration::from_secs(args.report_secs),
            shutdown_timeout: Duration::from_secs(args.shutdown_secs),
            export_path: args.export,
            jobs_path: args.jobs_file,
            load_jobs: args.load_jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config() {
        let config: Config = Args::try_parse_from(["meteo"]).unwrap().into();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn flags_override_defaults() {
        let argv = ["meteo", "data", "-p", "8", "--poll-secs", "1", "--load-jobs"];
        let args = Args::try_parse_from(argv).unwrap();
        let config = Config::from(args);
        assert_eq!(config.directory, PathBuf::from("data"));
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.load_jobs);
    }
}
