//! emx-netcmd CLI
//!
//! Run commands on a device and wait for conditions on their output.
//! Prints a JSON report on stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::{Context, Result};
use clap::Parser;
use emx_netcmd::{CommandSpec, JobConfig, MatchPolicy, ProcessExecutor, Runner};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "emx-netcmd")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Run commands on a device and wait for conditions on their output")]
struct Cli {
    /// Job file (.toml or .json)
    job: Option<PathBuf>,

    /// Command to send (repeatable, replaces the job's commands)
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,

    /// Condition to wait for, e.g. "result[0] contains MES" (repeatable)
    #[arg(short = 'w', long = "wait-for")]
    wait_for: Vec<String>,

    /// Match policy: all or any
    #[arg(short = 'm', long = "match")]
    match_policy: Option<MatchPolicy>,

    /// Retries after the first attempt [default: 9]
    #[arg(short = 'r', long)]
    retries: Option<u32>,

    /// Seconds between attempts [default: 1]
    #[arg(short = 'i', long)]
    interval: Option<u64>,

    /// Check mode: only run read-only commands
    #[arg(long, overrides_with = "no_check")]
    check: bool,

    /// Turn check mode off even when the job file sets it
    #[arg(long = "no-check", overrides_with = "check")]
    no_check: bool,

    /// Program each command is passed to as its last argument
    #[arg(short = 't', long, default_value = "sh -c")]
    transport: String,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let job = build_job(&cli)?;
    debug!(?job, "job loaded");

    let executor = ProcessExecutor::from_command_line(&cli.transport)
        .context("invalid --transport")?;
    let mut runner = Runner::new(executor);

    match runner.run(&job) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure.to_json())?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Start from the job file (if any) and apply command-line overrides.
fn build_job(cli: &Cli) -> Result<JobConfig> {
    let mut job = match cli.job {
        Some(ref path) => JobConfig::load(path)
            .with_context(|| format!("loading job {}", path.display()))?,
        None => {
            if cli.commands.is_empty() {
                anyhow::bail!("no commands: pass a job file or at least one --command");
            }
            JobConfig::new(Vec::<CommandSpec>::new())
        }
    };

    if !cli.commands.is_empty() {
        job.commands = cli.commands.iter().map(|c| CommandSpec::from(c.as_str())).collect();
    }
    if !cli.wait_for.is_empty() {
        job.wait_for = cli.wait_for.clone();
    }
    if let Some(policy) = cli.match_policy {
        job.match_policy = policy;
    }
    if let Some(retries) = cli.retries {
        job.retries = retries;
    }
    if let Some(interval) = cli.interval {
        job.interval = interval;
    }
    if cli.check {
        job.check_mode = true;
    } else if cli.no_check {
        job.check_mode = false;
    }
    Ok(job)
}
