//! Command implementations for the CostGuard CLI.

pub mod evaluate;
pub mod pipeline;
pub mod predict;

use colored::Colorize;
use costguard_core::InvocationResult;
use serde_json::Value;
use std::process::ExitCode;

/// Prints `result` and maps its status to the process exit code.
///
/// JSON mode prints the whole `{status_code, body}` to stdout. Text mode
/// hands a successful body to `render` and prints failures to stderr.
pub fn emit(
    result: &InvocationResult,
    json_output: bool,
    render: impl FnOnce(&Value),
) -> anyhow::Result<ExitCode> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if result.is_success() {
        render(&result.body);
    } else {
        eprintln!(
            "{} {} ({})",
            "Error:".red().bold(),
            result.body["error"].as_str().unwrap_or("unknown error"),
            result.error_kind().unwrap_or("UnknownError").dimmed()
        );
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Formats a JSON number as dollars.
pub fn dollars(value: &Value) -> String {
    value
        .as_f64()
        .map_or_else(|| "-".to_string(), |v| format!("${:.4}", v))
}
