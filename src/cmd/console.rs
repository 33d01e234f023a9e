//! The interactive command grammar and the reader that feeds the job queue.
//!
//! One command per line:
//!
//! ```text
//! SCAN --min <f> --max <f> --letter <c> --output <path> --job <name>
//! STATUS --job <name>
//! MAP
//! EXPORTMAP
//! PROCESS --file <path>
//! SHUTDOWN [--save-jobs]
//! START [--load-jobs]
//! ```
//!
//! Invalid lines are logged and never reach the queue.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    jobs::{Command, JobQueue},
    scan::ScanRequest,
    workload::ScanFilter,
};

#[derive(Parser, Debug)]
#[clap(no_binary_name = true, disable_help_subcommand = true)]
struct Line {
    #[clap(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug)]
enum ConsoleCommand {
    /// Start a background scan for matching records
    #[clap(name = "SCAN", allow_negative_numbers = true)]
    Scan {
        #[clap(short, long)]
        min: f64,
        #[clap(short = 'M', long)]
        max: f64,
        #[clap(short, long)]
        letter: String,
        #[clap(short, long)]
        output: PathBuf,
        #[clap(short, long)]
        job: String,
    },
    /// Show the state of a scan job
    #[clap(name = "STATUS")]
    Status {
        #[clap(short, long)]
        job: String,
    },
    /// Print the aggregate
    #[clap(name = "MAP")]
    Map,
    /// Write the aggregate to the export file
    #[clap(name = "EXPORTMAP")]
    ExportMap,
    /// Aggregate a single file now
    #[clap(name = "PROCESS")]
    Process {
        #[clap(short, long)]
        file: PathBuf,
    },
    /// Stop the system
    #[clap(name = "SHUTDOWN")]
    Shutdown {
        /// Save the names of unfinished jobs
        #[clap(short, long)]
        save_jobs: bool,
    },
    /// Reload saved job names
    #[clap(name = "START")]
    Start {
        #[clap(short, long)]
        load_jobs: bool,
    },
}

/// Parses one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    let command = match Line::try_parse_from(words)?.command {
        ConsoleCommand::Scan { min, max, letter, output, job } => {
            if min > max {
                bail!("Min temperature cannot be greater than max temperature");
            }
            let mut chars = letter.chars();
            let (Some(first), None) = (chars.next(), chars.next()) else {
                bail!("Letter must be a single character");
            };
            let letter = first.to_lowercase().next().unwrap_or(first);
            Command::Scan(ScanRequest {
                job,
                filter: ScanFilter { letter, min, max },
                output,
            })
        }
        ConsoleCommand::Status { job } => Command::Status { job },
        ConsoleCommand::Map => Command::Map,
        ConsoleCommand::ExportMap => Command::ExportMap,
        ConsoleCommand::Process { file } => Command::ProcessFile(file),
        ConsoleCommand::Shutdown { save_jobs } => Command::Shutdown { save_jobs },
        ConsoleCommand::Start { load_jobs } => Command::Start { load_jobs },
    };
    Ok(Some(command))
}

/// Reads commands from `input` and enqueues them until `cancel` fires.
///
/// End of input and Ctrl-C both enqueue a `SHUTDOWN` without saving jobs.
pub async fn read_commands<R>(input: R, queue: JobQueue, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    println!("Enter commands (type SHUTDOWN to exit):");
    let mut lines = input.lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let shutdown = |why: &str| {
        info!("{}, shutting down", why);
        if let Err(e) = queue.submit(Command::Shutdown { save_jobs: false }) {
            warn!("{:#}", e);
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = &mut ctrl_c => {
                shutdown("Interrupted");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(command)) => {
                        if let Err(e) = queue.submit(command) {
                            error!("{:#}", e);
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Invalid command {:?}: {}", line.trim(), e.to_string().trim_end())
                    }
                },
                Ok(None) => {
                    shutdown("End of input");
                    break;
                }
                Err(e) => {
                    error!("Error reading commands: {}", e);
                    shutdown("Console unreadable");
                    break;
                }
            }
        }
    }
    info!("Command reader terminated.");
}
