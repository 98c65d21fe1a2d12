//! Prediction persistence across the forecast and verify runs.
//!
//! Writes are conditional on `generated_at`: an artifact is never replaced by
//! one that is older. Reads keep "never forecast" ([`StoreError::NotFound`])
//! apart from "forecast corrupted" ([`StoreError::Malformed`]).

mod artifact;
mod file;
mod memory;
mod sqlite;

pub use artifact::PredictionArtifact;
pub use file::FilePredictionStore;
pub use memory::InMemoryPredictionStore;
pub use sqlite::SqlitePredictionStore;

use crate::analytics::Prediction;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Prediction store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No artifact exists under the key.
    #[error("no prediction stored under '{0}'")]
    NotFound(String),

    /// The stored artifact cannot be decoded.
    #[error("malformed prediction artifact '{key}': {reason}")]
    Malformed {
        /// Key of the artifact.
        key: String,
        /// Decoder diagnostic.
        reason: String,
    },

    /// The artifact could not be written.
    #[error("failed to write prediction: {0}")]
    Write(String),

    /// The backing storage could not be read.
    #[error("failed to read prediction: {0}")]
    Read(String),

    /// The key cannot be used with this backend.
    #[error("invalid prediction key '{0}'")]
    InvalidKey(String),
}

/// Result of a conditional put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The artifact was stored.
    Written,
    /// A strictly newer artifact already exists; nothing was written.
    Superseded {
        /// Timestamp of the artifact that was kept.
        existing_generated_at: DateTime<Utc>,
    },
}

impl PutOutcome {
    /// Short label used in invocation bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            PutOutcome::Written => "written",
            PutOutcome::Superseded { .. } => "superseded",
        }
    }
}

/// Persists and retrieves predictions by key.
pub trait PredictionStore: Send + Sync {
    /// Stores `prediction` unless a strictly newer one exists under `key`.
    fn put(&self, key: &str, prediction: &Prediction) -> Result<PutOutcome, StoreError>;

    /// Retrieves the prediction stored under `key`.
    fn get(&self, key: &str) -> Result<Prediction, StoreError>;
}

/// Decides a conditional put against the currently stored timestamp.
///
/// Equal timestamps overwrite so a retried run can rewrite its own artifact.
pub(crate) fn resolve_put(
    existing: Option<DateTime<Utc>>,
    incoming: DateTime<Utc>,
) -> Option<PutOutcome> {
    match existing {
        Some(existing_generated_at) if existing_generated_at > incoming => {
            Some(PutOutcome::Superseded {
                existing_generated_at,
            })
        }
        _ => None,
    }
}
