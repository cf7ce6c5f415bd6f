use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use job_runner::config::RunnerConfig;
use job_runner::scheduler::{Job, JobQueue, JobRunner, StatsSnapshot};
use job_runner::shutdown::install_shutdown_handler;
use job_runner::worker::CommandJob;

const IDLE_CHECK_INTERVAL_MS: u64 = 100;

#[derive(Parser, Debug)]
#[command(name = "job-runner")]
#[command(version)]
#[command(about = "Run shell commands as jobs with bounded concurrency")]
struct Args {
    /// Shell commands to run, one job each (e.g. "sleep 1 && echo done")
    commands: Vec<String>,

    /// Maximum number of jobs running at the same time
    #[arg(long, short = 'c', default_value = "8")]
    concurrency: usize,

    /// Back-off after an empty poll, in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Cancel in-flight jobs on SIGINT/SIGTERM instead of letting them finish
    #[arg(long)]
    hard: bool,

    /// Keep polling after every job is done (stop with SIGINT/SIGTERM)
    #[arg(long)]
    keep_running: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct JobSummary {
    job_id: String,
    status: String,
    command: String,
    exit_code: Option<i32>,
    stdout: Option<String>,
    stderr: Option<String>,
    created_at_ms: i64,
    completed_at_ms: Option<i64>,
}

#[derive(Serialize)]
struct RunSummary {
    jobs: Vec<JobSummary>,
    stats: StatsSnapshot,
}

impl From<&CommandJob> for JobSummary {
    fn from(job: &CommandJob) -> Self {
        let output = job.output();
        Self {
            job_id: job.id.to_string(),
            status: job.status().to_string(),
            command: job.command.clone(),
            exit_code: output.as_ref().and_then(|o| o.exit_code),
            stdout: output.as_ref().and_then(|o| o.stdout.clone()),
            stderr: output.as_ref().and_then(|o| o.stderr.clone()),
            created_at_ms: job.created_at.timestamp_millis(),
            completed_at_ms: output.as_ref().map(|o| o.completed_at.timestamp_millis()),
        }
    }
}

// =============================================================================
// Shutdown Supervision
// =============================================================================

/// Decide when and how the runner stops.
///
/// A signal triggers a hard shutdown with `--hard` and a graceful one
/// otherwise. Without `--keep-running` the runner also drains once the queue
/// is empty and nothing is in flight.
async fn supervise(
    runner: Arc<JobRunner<Arc<JobQueue>>>,
    signal: CancellationToken,
    hard: bool,
    keep_running: bool,
) {
    let mut idle_check = tokio::time::interval(Duration::from_millis(IDLE_CHECK_INTERVAL_MS));

    loop {
        tokio::select! {
            _ = signal.cancelled() => break,
            _ = idle_check.tick(), if !keep_running => {
                if runner.source().is_empty() && runner.in_flight() == 0 {
                    tracing::info!("All jobs done, draining runner");
                    break;
                }
            }
        }
    }

    if hard && signal.is_cancelled() {
        runner.shutdown();
    } else {
        runner.graceful_shutdown().await;
    }
}

fn print_summary(
    jobs: &[Arc<CommandJob>],
    stats: StatsSnapshot,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let summaries: Vec<JobSummary> = jobs.iter().map(|job| JobSummary::from(&**job)).collect();

    match output_format {
        OutputFormat::Json => {
            let output = RunSummary {
                jobs: summaries,
                stats,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            if summaries.is_empty() {
                println!("No jobs submitted.");
            } else {
                println!("{:<38} {:<10} {:<6} COMMAND", "JOB ID", "STATUS", "EXIT");
                println!("{}", "-".repeat(78));
                for job in &summaries {
                    let exit = job
                        .exit_code
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<38} {:<10} {:<6} {}",
                        job.job_id, job.status, exit, job.command
                    );
                }
            }
            println!();
            println!(
                "Admitted: {}  Finished: {}  Canceled: {}  Errored: {}  Poll errors: {}",
                stats.admitted, stats.finished, stats.canceled, stats.errored, stats.poll_errors
            );
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so the summary on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let queue = Arc::new(JobQueue::new());
    let mut jobs = Vec::with_capacity(args.commands.len());
    for command in args.commands {
        let job = Arc::new(CommandJob::new(command));
        if !queue.push(job.clone()) {
            return Err("job queue is full".into());
        }
        jobs.push(job);
    }

    let config = RunnerConfig::new(args.concurrency, args.poll_interval_ms);
    let runner = Arc::new(JobRunner::with_config(Arc::clone(&queue), config)?);
    let signal = install_shutdown_handler()?;

    tracing::info!(
        jobs = jobs.len(),
        max_concurrency = args.concurrency,
        hard = args.hard,
        keep_running = args.keep_running,
        "Starting job runner"
    );

    let supervisor = tokio::spawn(supervise(
        Arc::clone(&runner),
        signal,
        args.hard,
        args.keep_running,
    ));

    runner.run().await?;
    supervisor.await?;

    let stats = runner.stats();
    print_summary(&jobs, stats, &args.output)?;

    if stats.errored > 0 {
        return Err(format!("{} job(s) errored", stats.errored).into());
    }
    Ok(())
}
