//! Error types for CostGuard Core.

use crate::analytics::{ForecastError, SeriesError, ThresholdConfigError};
use crate::config::ConfigError;
use crate::notify::PublishError;
use crate::sources::SourceError;
use crate::store::StoreError;
use std::fmt;
use thiserror::Error;

/// Core error type for CostGuard operations.
#[derive(Error, Debug)]
pub enum CostGuardError {
    /// Series building errors
    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    /// Forecasting errors
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    /// Threshold configuration errors
    #[error("Threshold error: {0}")]
    Threshold(#[from] ThresholdConfigError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cost source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Prediction store errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Notification errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Stable classification of a [`CostGuardError`], reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Too few usable points to fit a trend.
    InsufficientData,
    /// The cost source or store backend failed or was unreachable.
    UpstreamService,
    /// The cost source rejected the requested time range.
    InvalidRange,
    /// No artifact under the requested key.
    NotFound,
    /// A stored artifact could not be decoded.
    MalformedArtifact,
    /// A deviation policy value is out of range.
    ThresholdConfig,
    /// Persisting an artifact failed.
    Write,
    /// Alert delivery failed.
    Publish,
    /// Configuration is missing or invalid.
    Config,
}

impl ErrorKind {
    /// Name reported in invocation bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InsufficientData => "InsufficientDataError",
            ErrorKind::UpstreamService => "UpstreamServiceError",
            ErrorKind::InvalidRange => "InvalidRangeError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::MalformedArtifact => "MalformedArtifactError",
            ErrorKind::ThresholdConfig => "ThresholdConfigError",
            ErrorKind::Write => "WriteError",
            ErrorKind::Publish => "PublishError",
            ErrorKind::Config => "ConfigError",
        }
    }

    /// Whether a retry by the scheduler may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::UpstreamService | ErrorKind::Publish)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CostGuardError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CostGuardError::Series(_) | CostGuardError::Forecast(_) => ErrorKind::InsufficientData,
            CostGuardError::Threshold(_) | CostGuardError::Config(ConfigError::Threshold(_)) => {
                ErrorKind::ThresholdConfig
            }
            CostGuardError::Config(_) => ErrorKind::Config,
            CostGuardError::Source(SourceError::Upstream(_)) => ErrorKind::UpstreamService,
            CostGuardError::Source(SourceError::InvalidRange(_)) => ErrorKind::InvalidRange,
            CostGuardError::Store(err) => match err {
                StoreError::NotFound(_) => ErrorKind::NotFound,
                StoreError::Malformed { .. } => ErrorKind::MalformedArtifact,
                StoreError::Write(_) => ErrorKind::Write,
                StoreError::Read(_) => ErrorKind::UpstreamService,
                StoreError::InvalidKey(_) => ErrorKind::Config,
            },
            CostGuardError::Publish(_) => ErrorKind::Publish,
        }
    }
}

/// Result type alias for CostGuard operations.
pub type Result<T> = std::result::Result<T, CostGuardError>;
