//! linkpulsed: the linkpulse daemon.
//!
//! Checks a fixed set of endpoints in recurring rounds until SIGINT or
//! SIGTERM, then waits for in-flight work to drain and exits.
//!
//! # Usage
//!
//! ```text
//! linkpulsed run --config linkpulse.toml
//! linkpulsed run --endpoint http://golang.org --max-concurrency 2
//! linkpulsed probe http://golang.org
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use linkpulse_core::{parse_duration, CheckSettings, CheckerConfig, Endpoint};
use linkpulse_health::{http_probe, CheckCoordinator, HttpProbe};
use tracing::info;

mod builtin;
mod logging;
mod signal;

#[derive(Parser)]
#[command(name = "linkpulsed", about = "linkpulse daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check endpoints in recurring rounds until SIGINT/SIGTERM.
    Run(RunArgs),
    /// Probe one endpoint once and print the status code.
    Probe {
        url: String,

        /// Give up after this long.
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        timeout: Duration,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Path to linkpulse.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint to check. Repeatable; replaces the configured list.
    #[arg(short, long = "endpoint")]
    endpoints: Vec<String>,

    /// Probes allowed in flight at once.
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Retries per round after the first attempt.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Wait between attempts, e.g. "2s" or "500ms".
    #[arg(long, value_parser = parse_duration)]
    retry_interval: Option<Duration>,

    /// Wait between rounds of the same endpoint.
    #[arg(long, value_parser = parse_duration)]
    cooldown: Option<Duration>,

    /// Upper bound on a single probe.
    #[arg(long, value_parser = parse_duration)]
    probe_timeout: Option<Duration>,

    #[command(flatten)]
    log: logging::LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            logging::init(&args.log)?;
            run(args).await
        }
        Command::Probe { url, timeout } => probe_once(&url, timeout).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let (endpoints, settings) = resolve(&args)?;
    let terminate = signal::Terminate::register().context("failed to install signal handlers")?;

    info!(
        endpoints = endpoints.len(),
        probe_timeout_ms = settings.probe_timeout.as_millis() as u64,
        "linkpulse daemon starting"
    );

    let probe = HttpProbe::new(settings.probe_timeout)?;
    let coordinator = CheckCoordinator::new(endpoints, settings, probe)?;

    let shutdown = coordinator.shutdown_handle();
    let signals = tokio::spawn(async move {
        let name = terminate.recv().await;
        info!(signal = name, "shutdown signal received");
        shutdown.shutdown();
    });

    coordinator.run().await;

    // Only still pending if the checker drained without a signal.
    signals.abort();
    info!("linkpulse daemon stopped");
    Ok(())
}

/// Merge the config file, command-line overrides, and built-in defaults.
fn resolve(args: &RunArgs) -> anyhow::Result<(Vec<Endpoint>, CheckSettings)> {
    let mut config = match &args.config {
        Some(path) => CheckerConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CheckerConfig::default(),
    };
    if !args.endpoints.is_empty() {
        config.endpoints = args.endpoints.clone();
    }

    let mut settings = config.resolve()?;
    if let Some(n) = args.max_concurrency {
        settings.max_concurrency = n;
    }
    if let Some(n) = args.max_retries {
        settings.max_retries = n;
    }
    if let Some(d) = args.retry_interval {
        settings.retry_interval = d;
    }
    if let Some(d) = args.cooldown {
        settings.cooldown = d;
    }
    if let Some(d) = args.probe_timeout {
        settings.probe_timeout = d;
    }
    settings.validate()?;

    let mut endpoints = config.endpoints()?;
    if endpoints.is_empty() {
        endpoints = builtin::endpoints();
    }
    Ok((endpoints, settings))
}

async fn probe_once(url: &str, timeout: Duration) -> anyhow::Result<()> {
    let status = http_probe(url, timeout)
        .await
        .with_context(|| format!("error checking {url}"))?;
    println!("{url} is up, status code: {}", status.as_u16());
    Ok(())
}
