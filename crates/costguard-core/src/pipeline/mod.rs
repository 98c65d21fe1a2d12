//! Orchestration of the forecast-and-store and fetch-and-verify runs.
//!
//! A [`Pipeline`] owns its collaborators through trait objects and holds no
//! mutable state, so the two modes only share what passes through the
//! [`PredictionStore`]. Typed errors are converted into an
//! [`InvocationResult`] in one place, [`Pipeline::run_at`].

mod factory;
mod invocation;

pub use invocation::InvocationResult;

use crate::analytics::{
    AnomalyDetector, AnomalyVerdict, CostObservation, CostSeriesBuilder, ForecastModel,
    Forecaster, PolicyKind, Prediction,
};
use crate::config::{DEFAULT_HISTORY_DAYS, DEFAULT_STORE_KEY};
use crate::error::Result;
use crate::notify::{AlertDispatcher, AlertStatus};
use crate::sources::{CostDataSource, Granularity, TimeRange};
use crate::store::{PredictionStore, PutOutcome, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Value, json};
use tracing::{error, info, warn};

/// Which run to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fit history, forecast the next period, persist the prediction.
    ForecastAndStore,
    /// Compare the realized cost against the baseline, alert on anomaly.
    FetchAndVerify,
    /// Return the daily billing history.
    BillingHistory,
}

/// Tunables that are not collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Key of the prediction artifact.
    pub store_key: String,
    /// Days of history used for forecasting and returned by billing history.
    pub history_days: u32,
    /// Granularity of the verify fetch.
    pub verify_granularity: Granularity,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            store_key: DEFAULT_STORE_KEY.to_string(),
            history_days: DEFAULT_HISTORY_DAYS,
            verify_granularity: Granularity::Daily,
        }
    }
}

/// Result of a forecast-and-store run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRun {
    /// Model fitted on the fetched history.
    pub model: ForecastModel,
    /// Forecast for the next period.
    pub prediction: Prediction,
    /// Whether the store took the prediction.
    pub stored: PutOutcome,
}

impl ForecastRun {
    /// Invocation body.
    pub fn to_json(&self) -> Value {
        json!({
            "predicted_cost": self.prediction.predicted_cost,
            "for_index": self.prediction.for_index,
            "for_date": self.prediction.for_date,
            "n_points": self.model.n_points,
            "slope": self.model.slope,
            "intercept": self.model.intercept,
            "generated_at": self.prediction.generated_at,
            "model_version": self.prediction.model_version,
            "stored": self.stored.as_str(),
        })
    }
}

/// Result of a fetch-and-verify run that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyRun {
    /// The detector ran.
    Evaluated {
        /// Detector output.
        verdict: AnomalyVerdict,
        /// Delivery outcome of the alert.
        alert: AlertStatus,
    },
    /// No prediction has been stored under `key` yet.
    NoBaseline {
        /// Store key that was read.
        key: String,
    },
    /// The stored prediction is for another period than the one verified.
    StaleBaseline {
        /// Store key that was read.
        key: String,
        /// Day the stored prediction is for, if it records one.
        for_date: Option<NaiveDate>,
        /// Day being verified.
        target: NaiveDate,
    },
    /// The source returned nothing for the target period.
    NoActualCost {
        /// Range that was fetched.
        range: TimeRange,
    },
    /// Fewer than two periods to compare.
    NotEnoughData {
        /// Periods the source returned.
        periods: usize,
    },
}

impl VerifyRun {
    /// The verdict, when the detector ran.
    pub fn verdict(&self) -> Option<&AnomalyVerdict> {
        match self {
            VerifyRun::Evaluated { verdict, .. } => Some(verdict),
            _ => None,
        }
    }

    /// Invocation body.
    pub fn to_json(&self) -> Value {
        match self {
            VerifyRun::Evaluated { verdict, alert } => json!({
                "predicted_cost": verdict.predicted_cost,
                "actual_cost": verdict.actual_cost,
                "threshold": verdict.threshold,
                "is_anomaly": verdict.is_anomaly,
                "status": verdict.message,
                "evaluated_at": verdict.evaluated_at,
                "policy": verdict.policy,
                "alert": alert.to_json(),
            }),
            VerifyRun::NoBaseline { key } => json!({
                "status": "no_baseline",
                "message": format!("No baseline available: no prediction stored under '{}'", key),
                "key": key,
            }),
            VerifyRun::StaleBaseline {
                key,
                for_date,
                target,
            } => json!({
                "status": "stale_baseline",
                "message": match for_date {
                    Some(date) => format!(
                        "No baseline for {}: prediction under '{}' is for {}",
                        target, key, date
                    ),
                    None => format!(
                        "No baseline for {}: prediction under '{}' has no target date",
                        target, key
                    ),
                },
                "key": key,
                "for_date": for_date,
                "target": target,
            }),
            VerifyRun::NoActualCost { range } => json!({
                "status": "no_actual_cost",
                "message": format!("No actual cost available for {}", range),
            }),
            VerifyRun::NotEnoughData { periods } => json!({
                "status": "not_enough_data",
                "message": format!("Not enough data to compare: {} period(s) returned", periods),
                "periods": periods,
            }),
        }
    }
}

/// The composed forecasting and verification pipeline.
pub struct Pipeline {
    source: Box<dyn CostDataSource>,
    store: Box<dyn PredictionStore>,
    dispatcher: AlertDispatcher,
    detector: AnomalyDetector,
    builder: CostSeriesBuilder,
    forecaster: Forecaster,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Creates a pipeline with default settings.
    pub fn new(
        source: Box<dyn CostDataSource>,
        store: Box<dyn PredictionStore>,
        dispatcher: AlertDispatcher,
        detector: AnomalyDetector,
    ) -> Self {
        Self {
            source,
            store,
            dispatcher,
            detector,
            builder: CostSeriesBuilder::new(),
            forecaster: Forecaster::new(),
            settings: PipelineSettings::default(),
        }
    }

    /// Replaces the default settings.
    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the default forecaster.
    #[must_use]
    pub fn with_forecaster(mut self, forecaster: Forecaster) -> Self {
        self.forecaster = forecaster;
        self
    }

    /// Current settings.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs `mode` now.
    pub fn run(&self, mode: Mode) -> InvocationResult {
        self.run_at(mode, Utc::now())
    }

    /// Runs `mode` as of `now` and converts the outcome into an invocation
    /// result. The only place errors become status codes.
    pub fn run_at(&self, mode: Mode, now: DateTime<Utc>) -> InvocationResult {
        let today = now.date_naive();
        let outcome = match mode {
            Mode::ForecastAndStore => self.forecast_and_store(today, now).map(|run| run.to_json()),
            Mode::FetchAndVerify => self.fetch_and_verify(today, now).map(|run| run.to_json()),
            Mode::BillingHistory => self
                .billing_history(today)
                .map(|billing| json!({ "billing": billing })),
        };

        match outcome {
            Ok(body) => InvocationResult::ok(body),
            Err(err) => {
                error!(?mode, kind = %err.kind(), error = %err, "Pipeline run failed");
                InvocationResult::from_error(&err)
            }
        }
    }

    /// Fetches history, fits the trend and stores the next-period forecast.
    pub fn forecast_and_store(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<ForecastRun> {
        let observations = self.billing_history(today)?;
        let series = self.builder.build(&observations)?;
        let (model, prediction) = self.forecaster.fit_and_predict_at(&series, now)?;

        let stored = self.store.put(&self.settings.store_key, &prediction)?;
        if let PutOutcome::Superseded {
            existing_generated_at,
        } = stored
        {
            warn!(
                key = %self.settings.store_key,
                %existing_generated_at,
                "Stored prediction is newer than this run; kept it"
            );
        }

        info!(
            key = %self.settings.store_key,
            predicted_cost = prediction.predicted_cost,
            n_points = model.n_points,
            stored = stored.as_str(),
            "Forecast run complete"
        );

        Ok(ForecastRun {
            model,
            prediction,
            stored,
        })
    }

    /// Evaluates the latest realized cost and dispatches the verdict.
    pub fn fetch_and_verify(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<VerifyRun> {
        let run = match self.detector.policy_kind() {
            PolicyKind::AbsoluteThreshold => self.verify_against_forecast(today, now)?,
            PolicyKind::RelativeIncrease => self.verify_against_previous(today, now)?,
        };

        if let VerifyRun::Evaluated { verdict, alert } = &run {
            info!(
                is_anomaly = verdict.is_anomaly,
                predicted_cost = verdict.predicted_cost,
                actual_cost = verdict.actual_cost,
                alert = ?alert,
                "Verify run complete"
            );
        }
        Ok(run)
    }

    /// Daily history for the `history_days` days before `today`.
    pub fn billing_history(&self, today: NaiveDate) -> Result<Vec<CostObservation>> {
        let range = TimeRange::last_days(today, self.settings.history_days)?;
        let amounts = self.source.fetch(&range, Granularity::Daily)?;
        info!(%range, rows = amounts.len(), "Fetched billing history");
        Ok(amounts.into_iter().map(CostObservation::from).collect())
    }

    fn verify_against_forecast(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<VerifyRun> {
        let key = &self.settings.store_key;
        let prediction = match self.store.get(key) {
            Ok(prediction) => prediction,
            Err(StoreError::NotFound(_)) => {
                warn!(key = %key, "No baseline prediction stored; skipping evaluation");
                return Ok(VerifyRun::NoBaseline { key: key.clone() });
            }
            Err(err) => return Err(err.into()),
        };

        let range = TimeRange::previous_day(today)?;
        if prediction.for_date != Some(range.start()) {
            warn!(
                key = %key,
                for_date = ?prediction.for_date,
                target = %range.start(),
                "Stored prediction is for another period; skipping evaluation"
            );
            return Ok(VerifyRun::StaleBaseline {
                key: key.clone(),
                for_date: prediction.for_date,
                target: range.start(),
            });
        }

        let amounts = self.source.fetch(&range, self.settings.verify_granularity)?;
        if amounts.is_empty() {
            warn!(%range, "No actual cost returned for target period");
            return Ok(VerifyRun::NoActualCost { range });
        }
        let actual_cost: f64 = amounts.iter().map(|a| a.amount).sum();

        let verdict = self
            .detector
            .detect_at(prediction.predicted_cost, actual_cost, now);
        let alert = self.dispatcher.dispatch(&verdict);
        Ok(VerifyRun::Evaluated { verdict, alert })
    }

    fn verify_against_previous(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<VerifyRun> {
        let range = match self.settings.verify_granularity {
            Granularity::Hourly => TimeRange::previous_day(today)?,
            Granularity::Daily => TimeRange::last_days(today, 2)?,
        };
        let mut amounts = self.source.fetch(&range, self.settings.verify_granularity)?;
        amounts.sort_by_key(|a| a.period_start);

        let [.., previous, current] = amounts.as_slice() else {
            warn!(%range, periods = amounts.len(), "Not enough periods to compare");
            return Ok(VerifyRun::NotEnoughData {
                periods: amounts.len(),
            });
        };

        let verdict = self.detector.detect_at(previous.amount, current.amount, now);
        let alert = self.dispatcher.dispatch(&verdict);
        Ok(VerifyRun::Evaluated { verdict, alert })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::PolicyConfig;
    use crate::notify::RecordingNotifier;
    use crate::sources::{CostAmount, InMemoryCostSource, SourceError};
    use crate::store::InMemoryPredictionStore;
    use chrono::{Days, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap()
    }

    fn day(offset_back: u64) -> NaiveDate {
        now().date_naive().checked_sub_days(Days::new(offset_back)).unwrap()
    }

    fn pipeline(
        amounts: Vec<CostAmount>,
        policy: PolicyConfig,
    ) -> (Pipeline, InMemoryPredictionStore, RecordingNotifier) {
        let store = InMemoryPredictionStore::new();
        let notifier = RecordingNotifier::new();
        let pipeline = Pipeline::new(
            Box::new(InMemoryCostSource::new(amounts)),
            Box::new(store.clone()),
            AlertDispatcher::new(Box::new(notifier.clone()), "ops"),
            AnomalyDetector::new(&policy).unwrap(),
        );
        (pipeline, store, notifier)
    }

    fn amount(offset_back: u64, cost: f64) -> CostAmount {
        CostAmount {
            period_start: day(offset_back),
            amount: cost,
        }
    }

    #[test]
    fn test_forecast_stores_next_period() {
        let (pipeline, store, _) = pipeline(
            vec![amount(3, 10.0), amount(2, 12.0), amount(1, 14.0)],
            PolicyConfig::default(),
        );

        let run = pipeline.forecast_and_store(now().date_naive(), now()).unwrap();

        assert_eq!(run.stored, PutOutcome::Written);
        assert!((run.prediction.predicted_cost - 16.0).abs() < 1e-9);
        assert_eq!(store.get(DEFAULT_STORE_KEY).unwrap(), run.prediction);
    }

    #[test]
    fn test_verify_without_baseline() {
        let (pipeline, _, notifier) = pipeline(vec![amount(1, 50.0)], PolicyConfig::default());

        let run = pipeline.fetch_and_verify(now().date_naive(), now()).unwrap();

        assert_eq!(
            run,
            VerifyRun::NoBaseline {
                key: DEFAULT_STORE_KEY.to_string()
            }
        );
        assert_eq!(run.to_json()["status"], "no_baseline");
        assert_eq!(notifier.count(), 0);
    }

    #[test]
    fn test_verify_only_uses_forecast_for_target_day() {
        let (pipeline, _, notifier) = pipeline(
            vec![amount(3, 10.0), amount(2, 12.0), amount(1, 14.0), amount(0, 15.0)],
            PolicyConfig::default(),
        );
        let run = pipeline.forecast_and_store(now().date_naive(), now()).unwrap();
        assert_eq!(run.model.n_points, 3);
        assert_eq!(run.prediction.for_date, Some(day(0)));

        // Same day: the stored forecast is for today, verify checks yesterday.
        let same_day = pipeline.fetch_and_verify(now().date_naive(), now()).unwrap();
        assert_eq!(
            same_day,
            VerifyRun::StaleBaseline {
                key: DEFAULT_STORE_KEY.to_string(),
                for_date: Some(day(0)),
                target: day(1),
            }
        );
        assert_eq!(same_day.to_json()["status"], "stale_baseline");
        assert_eq!(notifier.count(), 0);

        let tomorrow = day(0).checked_add_days(Days::new(1)).unwrap();
        let next_day = pipeline.fetch_and_verify(tomorrow, now()).unwrap();
        assert_eq!(next_day.verdict().unwrap().actual_cost, 15.0);
    }

    #[test]
    fn test_relative_compares_last_two_days() {
        let (pipeline, _, notifier) = pipeline(
            vec![amount(2, 100.0), amount(1, 121.0)],
            PolicyConfig::relative(20.0),
        );

        let run = pipeline.fetch_and_verify(now().date_naive(), now()).unwrap();
        let verdict = run.verdict().unwrap();

        assert!(verdict.is_anomaly);
        assert_eq!(verdict.predicted_cost, 100.0);
        assert_eq!(verdict.actual_cost, 121.0);
        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn test_relative_with_single_period() {
        let (pipeline, _, notifier) =
            pipeline(vec![amount(1, 121.0)], PolicyConfig::relative(20.0));

        let run = pipeline.fetch_and_verify(now().date_naive(), now()).unwrap();

        assert_eq!(run, VerifyRun::NotEnoughData { periods: 1 });
        assert_eq!(notifier.count(), 0);
    }

    #[test]
    fn test_source_failure_is_502() {
        let store = InMemoryPredictionStore::new();
        let pipeline = Pipeline::new(
            Box::new(InMemoryCostSource::failing(SourceError::Upstream(
                "throttled".to_string(),
            ))),
            Box::new(store),
            AlertDispatcher::new(Box::new(RecordingNotifier::new()), "ops"),
            AnomalyDetector::new(&PolicyConfig::default()).unwrap(),
        );

        let result = pipeline.run_at(Mode::ForecastAndStore, now());

        assert_eq!(result.status_code, 502);
        assert_eq!(result.error_kind(), Some("UpstreamServiceError"));
    }

    #[test]
    fn test_history_body() {
        let (pipeline, _, _) = pipeline(vec![amount(2, 3.5), amount(1, 4.0)], PolicyConfig::default());

        let result = pipeline.run_at(Mode::BillingHistory, now());

        assert_eq!(result.status_code, 200);
        assert_eq!(
            result.body,
            json!({"billing": [
                {"date": "2025-03-08", "cost": 3.5},
                {"date": "2025-03-09", "cost": 4.0},
            ]})
        );
    }
}
