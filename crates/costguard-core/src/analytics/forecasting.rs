//! Linear trend forecasting over a cleaned cost series.

use super::series::CostSeries;
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Version tag stamped on predictions produced by [`Forecaster`].
pub const MODEL_VERSION: &str = "ols-linear/v1";

/// Minimum number of points needed to determine a trend.
pub const MIN_FIT_POINTS: usize = 2;

/// Fitted simple linear regression of cost on day index.
///
/// The model can be serialized and cached. Callers that reuse a cached model
/// must check [`ForecastModel::is_stale`] first; the pipeline refits on every
/// run and never reuses one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastModel {
    /// Cost change per day index.
    pub slope: f64,
    /// Fitted cost at day index 0.
    pub intercept: f64,
    /// Number of points the model was fitted on.
    pub n_points: usize,
    /// When the model was fitted.
    pub fitted_at: DateTime<Utc>,
}

impl ForecastModel {
    /// Evaluates the fitted line at `index`.
    pub fn predict_at(&self, index: usize) -> f64 {
        self.slope.mul_add(index as f64, self.intercept)
    }

    /// Index one step beyond the last fitted point.
    pub fn next_index(&self) -> usize {
        self.n_points
    }

    /// Returns true once the model is at least `max_age` old.
    ///
    /// A zero `max_age` makes every model stale, which is the refit-every-run
    /// policy.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.fitted_at) >= max_age
    }
}

/// Point forecast for the period following the observed series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Forecast cost. May be negative on a steep decline; never clamped here.
    pub predicted_cost: f64,
    /// Day index the forecast is for.
    pub for_index: usize,
    /// Calendar day the forecast is for: the day after the last observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_date: Option<NaiveDate>,
    /// When the forecast was produced.
    pub generated_at: DateTime<Utc>,
    /// Version of the model that produced it.
    pub model_version: Option<String>,
}

/// Forecasting errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastError {
    /// Too few points to fit a trend.
    #[error("insufficient data: {n_points} points, at least {required} required to fit a trend")]
    InsufficientData {
        /// Points in the series.
        n_points: usize,
        /// Minimum required.
        required: usize,
    },
}

/// Ordinary least-squares trend forecaster.
#[derive(Debug, Clone)]
pub struct Forecaster {
    model_version: Option<String>,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster {
    /// Creates a forecaster stamping predictions with [`MODEL_VERSION`].
    pub fn new() -> Self {
        Self {
            model_version: Some(MODEL_VERSION.to_string()),
        }
    }

    /// Overrides the version tag stamped on predictions.
    #[must_use]
    pub fn with_model_version(mut self, version: Option<String>) -> Self {
        self.model_version = version;
        self
    }

    /// Fits `cost = slope * day_index + intercept` by least squares.
    ///
    /// # Arguments
    /// * `series` - Cleaned cost series
    /// * `fitted_at` - Timestamp recorded on the model
    pub fn fit(
        &self,
        series: &CostSeries,
        fitted_at: DateTime<Utc>,
    ) -> Result<ForecastModel, ForecastError> {
        let n_points = series.len();
        if n_points < MIN_FIT_POINTS {
            return Err(ForecastError::InsufficientData {
                n_points,
                required: MIN_FIT_POINTS,
            });
        }

        let n = n_points as f64;
        let (sum_x, sum_y) = series
            .indexed_costs()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x as f64, sy + y));
        let mean_x = sum_x / n;
        let mean_y = sum_y / n;

        let (covariance, variance) =
            series
                .indexed_costs()
                .fold((0.0, 0.0), |(cov, var), (x, y)| {
                    let dx = x as f64 - mean_x;
                    (dx.mul_add(y - mean_y, cov), dx.mul_add(dx, var))
                });

        // Indices are contiguous, so n >= 2 guarantees a non-zero variance.
        let slope = covariance / variance;
        let intercept = slope.mul_add(-mean_x, mean_y);

        debug!(slope, intercept, n_points, "Fitted linear cost trend");

        Ok(ForecastModel {
            slope,
            intercept,
            n_points,
            fitted_at,
        })
    }

    /// Fits the series and forecasts one step beyond its last index.
    pub fn fit_and_predict(
        &self,
        series: &CostSeries,
    ) -> Result<(ForecastModel, Prediction), ForecastError> {
        self.fit_and_predict_at(series, Utc::now())
    }

    /// Same as [`Forecaster::fit_and_predict`] with an explicit timestamp.
    pub fn fit_and_predict_at(
        &self,
        series: &CostSeries,
        now: DateTime<Utc>,
    ) -> Result<(ForecastModel, Prediction), ForecastError> {
        let model = self.fit(series, now)?;
        let for_index = model.next_index();
        let for_date = series
            .last()
            .and_then(|point| point.date.checked_add_days(Days::new(1)));
        let prediction = Prediction {
            predicted_cost: model.predict_at(for_index),
            for_index,
            for_date,
            generated_at: now,
            model_version: self.model_version.clone(),
        };

        info!(
            predicted_cost = prediction.predicted_cost,
            for_index,
            for_date = ?for_date,
            "Forecast next period cost"
        );

        Ok((model, prediction))
    }
}
