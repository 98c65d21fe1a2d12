//! Offline forecast from a billing history file.

use super::{dollars, emit};
use colored::Colorize;
use costguard_core::analytics::{CostSeriesBuilder, Forecaster};
use costguard_core::sources::JsonFileCostSource;
use costguard_core::{CostGuardError, InvocationResult};
use serde_json::{Value, json};
use std::path::Path;
use std::process::ExitCode;

fn forecast_file(input: &Path) -> Result<Value, CostGuardError> {
    let observations = JsonFileCostSource::new(input).load_all()?;
    let series = CostSeriesBuilder::new().build(&observations)?;
    let (model, prediction) = Forecaster::new().fit_and_predict(&series)?;

    Ok(json!({
        "predicted_cost": prediction.predicted_cost,
        "for_index": prediction.for_index,
        "for_date": prediction.for_date,
        "n_points": model.n_points,
        "slope": model.slope,
        "intercept": model.intercept,
        "generated_at": prediction.generated_at,
    }))
}

/// Execute the predict command.
pub fn execute(input: &Path, json_output: bool) -> anyhow::Result<ExitCode> {
    let result = match forecast_file(input) {
        Ok(body) => InvocationResult::ok(body),
        Err(err) => InvocationResult::from_error(&err),
    };

    emit(&result, json_output, |body| {
        println!();
        println!("{}", "📈 Offline Forecast".bold().cyan());
        println!();
        println!("  Input: {}", input.display());
        println!("  Points used: {}", body["n_points"]);
        if let Some(date) = body["for_date"].as_str() {
            println!("  Forecast for: {}", date);
        }
        println!("  Predicted cost: {}", dollars(&body["predicted_cost"]).bold());
        println!();
    })
}
