use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use loadforge::executor::run_load_test;
use loadforge::models::dsl_model::{DslConfig, Overrides};
use loadforge::{report, telemetry};

/// Exit status when a check threshold was configured and missed.
const THRESHOLD_MISSED: u8 = 99;

#[derive(Parser)]
#[command(name = "loadforge")]
#[command(about = "HTTP load generator with named response checks")]
#[command(version)]
struct Cli {
    /// JSON load test description
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Target URL (GET)
    #[arg(short = 't', long, env = "LOADFORGE_TARGET")]
    target: Option<String>,

    /// Number of virtual users
    #[arg(short = 'u', long = "vus", env = "LOADFORGE_VUS")]
    virtual_users: Option<u64>,

    /// Test duration, e.g. 30s or 1m
    #[arg(short = 'd', long, env = "LOADFORGE_DURATION", value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Pause between iterations of one virtual user
    #[arg(short = 's', long, env = "LOADFORGE_SLEEP", value_parser = humantime::parse_duration)]
    sleep: Option<Duration>,

    /// Per-request timeout (defaults to the sleep interval)
    #[arg(long, env = "LOADFORGE_TIMEOUT", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Minimum fraction of passing checks (0.0-1.0) for a zero exit status
    #[arg(long)]
    check_threshold: Option<f64>,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    summary_export: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            target: self.target.clone(),
            virtual_users: self.virtual_users,
            duration: self.duration,
            sleep: self.sleep,
            timeout: self.timeout,
            check_threshold: self.check_threshold,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut dsl = match &cli.config {
        Some(path) => DslConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => DslConfig::default(),
    };
    dsl.apply_overrides(cli.overrides());

    let config = dsl.validate().context("invalid configuration")?;
    let threshold = config.check_threshold;

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            telemetry::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let summary = run_load_test(config, shutdown).await;
    signals.abort();

    report::print_summary(&summary);
    if let Some(path) = &cli.summary_export {
        report::export_json(&summary, path)
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }

    if summary.meets_threshold(threshold) {
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            ratio = summary.pass_ratio().unwrap_or(0.0),
            threshold = threshold.unwrap_or(0.0),
            "check threshold missed"
        );
        Ok(ExitCode::from(THRESHOLD_MISSED))
    }
}
