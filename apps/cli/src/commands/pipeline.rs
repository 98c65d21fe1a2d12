//! Forecast, verify and history commands backed by the configured pipeline.

use super::{dollars, emit};
use crate::config::load_config;
use colored::Colorize;
use costguard_core::{Config, InvocationResult, Mode, Pipeline};
use serde_json::Value;
use std::path::Path;
use std::process::ExitCode;
use tracing::debug;

fn run(config: &Config, mode: Mode) -> InvocationResult {
    match Pipeline::from_config(config) {
        Ok(pipeline) => {
            debug!(?mode, key = %pipeline.settings().store_key, "Pipeline constructed");
            pipeline.run(mode)
        }
        Err(err) => {
            debug!(?mode, error = %err, "Pipeline construction failed");
            InvocationResult::from_error(&err)
        }
    }
}

/// Execute the forecast command.
pub fn forecast(config_path: Option<&Path>, json_output: bool) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let result = run(&config, Mode::ForecastAndStore);
    emit(&result, json_output, render_forecast)
}

/// Execute the verify command.
pub fn verify(config_path: Option<&Path>, json_output: bool) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let result = run(&config, Mode::FetchAndVerify);
    emit(&result, json_output, render_verify)
}

/// Execute the history command.
pub fn history(
    config_path: Option<&Path>,
    days: Option<u32>,
    json_output: bool,
) -> anyhow::Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if let Some(days) = days {
        config.source.history_days = days;
    }
    let result = run(&config, Mode::BillingHistory);
    emit(&result, json_output, render_history)
}

fn render_forecast(body: &Value) {
    println!();
    println!("{}", "📈 Cost Forecast".bold().cyan());
    println!();
    if let Some(date) = body["for_date"].as_str() {
        println!("  Forecast for: {}", date);
    }
    println!("  Predicted cost: {}", dollars(&body["predicted_cost"]).bold());
    println!(
        "  Trend: {:+.4}/day over {} days",
        body["slope"].as_f64().unwrap_or_default(),
        body["n_points"]
    );
    match body["stored"].as_str() {
        Some("written") => println!("  Stored: {}", "✓ written".green()),
        _ => println!("  Stored: {}", "kept newer prediction".yellow()),
    }
    println!();
}

fn render_verify(body: &Value) {
    println!();
    println!("{}", "🔍 Cost Verification".bold().cyan());
    println!();

    let status = body["status"].as_str().unwrap_or_default();
    match body["is_anomaly"].as_bool() {
        Some(true) => println!("  {}", status.red().bold()),
        Some(false) => println!("  {}", status.green()),
        None => {
            let message = body["message"].as_str().unwrap_or(status);
            println!("  {}", message.yellow());
            println!();
            return;
        }
    }

    println!("  Baseline: {}", dollars(&body["predicted_cost"]));
    println!("  Actual:   {}", dollars(&body["actual_cost"]));
    match &body["alert"] {
        Value::String(s) if s == "sent" => println!("  Alert: {}", "sent".green()),
        Value::String(s) => println!("  Alert: {}", s.dimmed()),
        other => println!(
            "  Alert: {} {}",
            "failed".red(),
            other["failed"].as_str().unwrap_or_default()
        ),
    }
    println!();
}

fn render_history(body: &Value) {
    let rows = body["billing"].as_array().map(Vec::as_slice).unwrap_or_default();
    println!();
    println!("{}", "💰 Billing History".bold().cyan());
    println!();
    if rows.is_empty() {
        println!("  {}", "No billing data in range".yellow());
    }
    for row in rows {
        println!(
            "  {}  {:>12}",
            row["date"].as_str().unwrap_or_default(),
            dollars(&row["cost"])
        );
    }
    println!();
}
