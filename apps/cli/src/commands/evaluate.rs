//! Offline anomaly evaluation on explicit values.

use super::emit;
use crate::config::load_config;
use colored::Colorize;
use costguard_core::analytics::{AnomalyDetector, AnomalyVerdict, PolicyConfig, PolicyKind};
use costguard_core::{CostGuardError, InvocationResult};
use serde_json::Value;
use std::path::Path;
use std::process::ExitCode;

/// Inputs of the evaluate command.
#[derive(Debug, Clone)]
pub struct EvaluateArgs {
    pub baseline: f64,
    pub observed: f64,
    pub policy: Option<String>,
    pub threshold: Option<f64>,
}

/// Applies command-line overrides on top of the configured policy.
fn resolve_policy(mut policy: PolicyConfig, args: &EvaluateArgs) -> anyhow::Result<PolicyConfig> {
    if let Some(kind) = &args.policy {
        let kind: PolicyKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        if kind != policy.kind {
            policy.value = None;
        }
        policy.kind = kind;
    }
    if let Some(threshold) = args.threshold {
        policy.value = Some(threshold);
    }
    Ok(policy)
}

fn evaluate(
    policy: &PolicyConfig,
    args: &EvaluateArgs,
) -> Result<AnomalyVerdict, CostGuardError> {
    let detector = AnomalyDetector::new(policy)?;
    Ok(detector.detect(args.baseline, args.observed))
}

/// Invocation body: the verdict fields plus `status` carrying the message.
fn verdict_body(verdict: &AnomalyVerdict) -> serde_json::Result<Value> {
    let mut body = serde_json::to_value(verdict)?;
    body["status"] = Value::String(verdict.message.clone());
    Ok(body)
}

/// Execute the evaluate command.
pub fn execute(
    config_path: Option<&Path>,
    args: EvaluateArgs,
    json_output: bool,
) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let policy = resolve_policy(config.policy, &args)?;

    let result = match evaluate(&policy, &args) {
        Ok(verdict) => InvocationResult::ok(verdict_body(&verdict)?),
        Err(err) => InvocationResult::from_error(&err),
    };

    emit(&result, json_output, |body| {
        let status = body["status"].as_str().unwrap_or_default();
        if body["is_anomaly"].as_bool().unwrap_or_default() {
            println!("{}", status.red().bold());
        } else {
            println!("{}", status.green());
        }
        println!(
            "  Policy: {} ({})",
            policy.kind,
            policy.effective_value()
        );
    })
}
