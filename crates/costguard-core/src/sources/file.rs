//! Billing history read from a local JSON file.

use super::{CostAmount, CostDataSource, Granularity, SourceError, TimeRange};
use crate::analytics::CostObservation;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads a `[{"date": "YYYY-MM-DD", "cost": 1.23}, ...]` billing history file.
///
/// The file carries daily rows only; hourly requests get the daily rows.
#[derive(Debug, Clone)]
pub struct JsonFileCostSource {
    path: PathBuf,
}

impl JsonFileCostSource {
    /// Creates a source over the given file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every row of the file in file order.
    pub fn load_all(&self) -> Result<Vec<CostObservation>, SourceError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            SourceError::Upstream(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SourceError::Upstream(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }
}

impl CostDataSource for JsonFileCostSource {
    fn fetch(
        &self,
        range: &TimeRange,
        granularity: Granularity,
    ) -> Result<Vec<CostAmount>, SourceError> {
        if granularity == Granularity::Hourly {
            debug!(path = %self.path.display(), "File source has daily rows only");
        }

        let amounts: Vec<CostAmount> = self
            .load_all()?
            .into_iter()
            .filter(|row| range.contains(row.date))
            .map(|row| CostAmount {
                period_start: row.date,
                amount: row.cost,
            })
            .collect();

        debug!(path = %self.path.display(), %range, rows = amounts.len(), "Read billing history file");
        Ok(amounts)
    }
}
