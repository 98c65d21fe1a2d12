//! In-memory cost source for tests and demos.

use super::{CostAmount, CostDataSource, Granularity, SourceError, TimeRange};
use std::sync::{Arc, Mutex};

/// Serves a fixed list of amounts, or a fixed failure.
///
/// Clones share the request log, so a test can keep a handle after handing
/// the source to a pipeline.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCostSource {
    amounts: Vec<CostAmount>,
    failure: Option<SourceError>,
    requests: Arc<Mutex<Vec<(TimeRange, Granularity)>>>,
}

impl InMemoryCostSource {
    /// Source serving `amounts` filtered to the requested range.
    pub fn new(amounts: Vec<CostAmount>) -> Self {
        Self {
            amounts,
            ..Self::default()
        }
    }

    /// Source failing every fetch with `error`.
    pub fn failing(error: SourceError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Ranges requested so far.
    pub fn requests(&self) -> Vec<(TimeRange, Granularity)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl CostDataSource for InMemoryCostSource {
    fn fetch(
        &self,
        range: &TimeRange,
        granularity: Granularity,
    ) -> Result<Vec<CostAmount>, SourceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((*range, granularity));
        }

        if let Some(ref error) = self.failure {
            return Err(error.clone());
        }

        Ok(self
            .amounts
            .iter()
            .filter(|a| range.contains(a.period_start))
            .copied()
            .collect())
    }
}
