//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use costguard_core::analytics::{AnomalyDetector, PolicyConfig};
use costguard_core::notify::{AlertDispatcher, RecordingNotifier};
use costguard_core::sources::{CostAmount, InMemoryCostSource};
use costguard_core::store::PredictionStore;
use costguard_core::Pipeline;

/// Fixed clock for deterministic runs.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 7, 30, 0).unwrap()
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

/// The day `days_back` days before [`today`].
pub fn day(days_back: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(days_back)).unwrap()
}

/// Daily amounts ending yesterday, oldest first.
pub fn daily_history(costs: &[f64]) -> Vec<CostAmount> {
    let len = costs.len() as u64;
    costs
        .iter()
        .enumerate()
        .map(|(i, &amount)| CostAmount {
            period_start: day(len - i as u64),
            amount,
        })
        .collect()
}

/// Pipeline over in-memory source and notifier doubles.
pub fn build_pipeline(
    source: InMemoryCostSource,
    store: Box<dyn PredictionStore>,
    notifier: RecordingNotifier,
    policy: PolicyConfig,
) -> Pipeline {
    Pipeline::new(
        Box::new(source),
        store,
        AlertDispatcher::new(Box::new(notifier), "cost-alerts"),
        AnomalyDetector::new(&policy).unwrap(),
    )
}
