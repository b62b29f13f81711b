// ABOUTME: Command-line entry point for battery-health inference jobs
// ABOUTME: Runs and inspects inference jobs from the terminal with live progress bars

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use zeflash_inference::remote::auth::token_preview;
use zeflash_inference::{
    CancellationToken, ClientConfig, DeviceId, InferenceClient, JobPoller, JobStatus,
    ReportLocator,
};

#[derive(Parser)]
#[command(name = "zeflash-inference")]
#[command(about = "Trigger and track battery-health inference jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "ZEFLASH_CONFIG")]
    config: Option<PathBuf>,

    /// Inference service base URL
    #[arg(long, global = true, env = "ML_API_URL")]
    base_url: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate reports for one or more devices and wait for them to finish
    Run {
        /// Devices as EVSEID_CONNECTOR
        #[arg(required = true, num_args = 1..)]
        devices: Vec<DeviceId>,
        /// Number of telemetry samples to analyse
        #[arg(long)]
        limit: Option<u32>,
        /// Milliseconds between status polls
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Submit a job and print its id without waiting
    Trigger {
        device: DeviceId,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print the current status of a job
    Status { job_id: String },
    /// Poll an existing job until it finishes
    Watch { job_id: String },
    /// Print the result payload of a completed job
    #[command(name = "result")]
    JobResult { job_id: String },
    /// Check that the inference service is up
    Health,
    /// Print report image URLs for a device
    Report {
        device: DeviceId,
        /// Check whether the report already exists in storage
        #[arg(long)]
        check: bool,
    },
    /// Fetch a charger-telemetry token
    Token,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    ClientConfig::load_with_base_url(cli.config.as_deref(), cli.base_url.as_deref())
        .context("Failed to load configuration")
}

/// Cancels `token` on Ctrl-C so in-flight polls stop promptly.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling inference jobs");
            token.cancel();
        }
    });
}

fn progress_style() -> Result<ProgressStyle> {
    Ok(
        ProgressStyle::with_template("{prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    )
}

fn print_outcome(device: &DeviceId, status: &JobStatus, reports: &ReportLocator) {
    println!("{} [{}] {}: {}", device, status.job_id, status.status, status.message);
    if status.is_completed() {
        let urls = match &status.result {
            Some(result) => ReportLocator::artifacts_for_result(result),
            None => reports.artifacts(device),
        };
        for url in urls {
            println!("  {}", url);
        }
    }
}

async fn run_jobs(
    client: InferenceClient,
    config: &ClientConfig,
    devices: Vec<DeviceId>,
    limit: Option<u32>,
) -> Result<()> {
    let reports = client.reports().clone();
    let poller = JobPoller::new(client, config.poll);
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let bars = MultiProgress::new();
    let style = progress_style()?;

    let jobs = devices.iter().map(|device| {
        let bar = bars.add(ProgressBar::new(100));
        bar.set_style(style.clone());
        bar.set_prefix(device.to_string());
        bar.set_message("Starting ML inference...");

        let request = device.to_request(limit);
        let poller = &poller;
        let cancel = &cancel;
        async move {
            let outcome = poller
                .run(
                    &request,
                    |status| {
                        bar.set_position(u64::from(status.progress.min(100)));
                        bar.set_message(status.message.clone());
                    },
                    cancel,
                )
                .await;
            bar.finish();
            outcome
        }
    });
    let outcomes = join_all(jobs).await;

    let mut failures = 0;
    for (device, outcome) in devices.iter().zip(outcomes) {
        match outcome {
            Ok(status) => {
                print_outcome(device, &status, &reports);
                if status.is_failed() {
                    failures += 1;
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", device, e);
                if e.is_retryable() {
                    eprintln!("  Re-run the command to retry generation");
                }
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} inference jobs did not complete", failures, devices.len());
    }
    Ok(())
}

async fn watch_job(client: InferenceClient, config: &ClientConfig, job_id: &str) -> Result<()> {
    let poller = JobPoller::new(client, config.poll);
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let bar = ProgressBar::new(100);
    bar.set_style(progress_style()?);
    bar.set_prefix(job_id.to_string());

    let status = poller
        .poll(
            job_id,
            |status| {
                bar.set_position(u64::from(status.progress.min(100)));
                bar.set_message(status.message.clone());
            },
            &cancel,
        )
        .await;
    bar.finish();

    let status = status?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    if status.is_failed() {
        bail!("Job {} failed: {}", status.job_id, status.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = load_config(&cli)?;
    let client = InferenceClient::new(&config).context("Failed to create inference client")?;

    match cli.command {
        Commands::Run {
            devices,
            limit,
            interval_ms,
            timeout_secs,
        } => {
            if let Some(ms) = interval_ms {
                config.poll.interval = Duration::from_millis(ms);
            }
            if let Some(secs) = timeout_secs {
                config.poll.timeout = Duration::from_secs(secs);
            }
            config.validate()?;
            run_jobs(client, &config, devices, limit).await
        }
        Commands::Trigger { device, limit } => {
            let handle = client.trigger(&device.to_request(limit)).await?;
            println!("{}", handle.job_id);
            Ok(())
        }
        Commands::Status { job_id } => {
            let status = client.fetch_status(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Watch { job_id } => watch_job(client, &config, &job_id).await,
        Commands::JobResult { job_id } => {
            let result = client.fetch_result(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Health => {
            let health = client.health().await?;
            println!(
                "{} {}",
                health.status,
                health.timestamp.as_deref().unwrap_or_default()
            );
            Ok(())
        }
        Commands::Report { device, check } => {
            if check {
                let exists = client.report_exists(&device).await?;
                println!(
                    "{}: {}",
                    device,
                    if exists { "report available" } else { "no report yet" }
                );
                if !exists {
                    return Ok(());
                }
            }
            for url in client.reports().artifacts(&device) {
                println!("{}", url);
            }
            Ok(())
        }
        Commands::Token => {
            let token = client
                .token_provider(config.token_endpoint.clone())
                .fetch_token()
                .await?;
            println!("{}", token_preview(&token));
            Ok(())
        }
    }
}
