//! CostGuard Core - cloud cost forecasting and spend anomaly detection.
//!
//! This crate provides:
//! - Cost series cleaning and a least-squares trend forecaster
//! - Configurable deviation policies and an anomaly detector
//! - Cost sources, prediction stores and notifiers behind narrow traits
//! - A pipeline composing them into forecast and verify runs
//!
//! # Example
//!
//! ```rust,no_run
//! use costguard_core::{Config, Mode, Pipeline};
//!
//! fn main() -> costguard_core::Result<()> {
//!     let mut config = Config::discover_and_load()?;
//!     config.apply_env_overrides()?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!     let result = pipeline.run(Mode::FetchAndVerify);
//!     println!("{} {}", result.status_code, result.body);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod sources;
pub mod store;

pub use analytics::{
    AnomalyDetector, AnomalyVerdict, CostObservation, CostSeries, CostSeriesBuilder,
    DeviationPolicy, ForecastError, ForecastModel, Forecaster, PolicyConfig, PolicyKind,
    Prediction, SeriesError, ThresholdConfigError,
};
pub use config::{Config, ConfigError};
pub use error::{CostGuardError, ErrorKind, Result};
pub use notify::{AlertDispatcher, AlertOn, AlertStatus, Notifier, PublishError};
pub use pipeline::{ForecastRun, InvocationResult, Mode, Pipeline, PipelineSettings, VerifyRun};
pub use sources::{CostAmount, CostDataSource, Granularity, SourceError, TimeRange};
pub use store::{PredictionArtifact, PredictionStore, PutOutcome, StoreError};
