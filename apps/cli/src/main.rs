//! CostGuard CLI - forecast cloud spend and flag cost anomalies
//!
//! This CLI provides a `costguard` command that runs the forecast-and-store
//! and fetch-and-verify pipelines, plus offline forecasting and evaluation.

mod commands;
mod config;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use commands::{evaluate, pipeline, predict};

const DEFAULT_LOG_FILTER: &str = "costguard_core=info,costguard=info";

/// CostGuard - cloud cost forecasting and anomaly detection
///
/// Forecasts tomorrow's spend from billing history, stores the forecast, and
/// later checks the realized cost against it.
#[derive(Parser, Debug)]
#[command(
    name = "costguard",
    author,
    version,
    about = "CostGuard - cloud cost forecasting and anomaly detection"
)]
struct Args {
    /// Configuration file (skips ~/.costguard/config.toml and ./costguard.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast the next period and store the prediction
    Forecast {
        /// Output the invocation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the realized cost against the stored baseline
    ///
    /// Publishes an alert when the configured policy flags an anomaly.
    Verify {
        /// Output the invocation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show daily billing history
    History {
        /// Number of days (defaults to source.history_days)
        #[arg(long)]
        days: Option<u32>,

        /// Output the invocation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forecast from a billing history file without touching the store
    Predict {
        /// Billing history JSON file ([{"date", "cost"}, ...])
        #[arg(short, long)]
        input: PathBuf,

        /// Output the invocation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate an observed cost against a baseline
    Evaluate {
        /// Predicted (absolute) or previous-period (relative) cost
        #[arg(long)]
        baseline: f64,

        /// Actual (absolute) or current-period (relative) cost
        #[arg(long)]
        observed: f64,

        /// Policy kind (absolute_threshold, relative_increase)
        #[arg(long)]
        policy: Option<String>,

        /// Multiplier (absolute) or percent (relative)
        #[arg(long)]
        threshold: Option<f64>,

        /// Output the invocation result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(log_level: Option<&str>, format: LogFormat) -> anyhow::Result<()> {
    let filter = match log_level {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    init_tracing(args.log_level.as_deref(), args.log_format)?;

    let config_path = args.config.as_deref();
    let code = match args.command {
        Command::Forecast { json } => pipeline::forecast(config_path, json)?,
        Command::Verify { json } => pipeline::verify(config_path, json)?,
        Command::History { days, json } => pipeline::history(config_path, days, json)?,
        Command::Predict { input, json } => predict::execute(&input, json)?,
        Command::Evaluate {
            baseline,
            observed,
            policy,
            threshold,
            json,
        } => evaluate::execute(
            config_path,
            evaluate::EvaluateArgs {
                baseline,
                observed,
                policy,
                threshold,
            },
            json,
        )?,
    };

    Ok(code)
}
