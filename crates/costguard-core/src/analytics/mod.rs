//! Cost analytics: series cleaning, trend forecasting and anomaly decisions.
//!
//! Everything in this module is a pure transformation over in-memory data.
//! I/O lives with the external collaborators and the pipeline.

pub mod anomaly_detection;
pub mod forecasting;
pub mod policy;
pub mod series;

pub use anomaly_detection::{AnomalyDetector, AnomalyVerdict, detect};
pub use forecasting::{ForecastError, ForecastModel, Forecaster, MODEL_VERSION, Prediction};
pub use policy::{
    AbsoluteThreshold, DeviationPolicy, EvaluationContext, PolicyConfig, PolicyKind,
    PolicyOutcome, RelativeIncrease, ThresholdConfigError,
};
pub use series::{CostObservation, CostSeries, CostSeriesBuilder, SeriesError, SeriesPoint};
