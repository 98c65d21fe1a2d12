//! Cost series construction from raw billing observations.
//!
//! Raw observations arrive unsorted and may repeat dates or carry zero
//! spend. The builder turns them into a contiguous, regression-ready series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// A single raw billing observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostObservation {
    /// Calendar day the cost was incurred on.
    pub date: NaiveDate,
    /// Unblended cost for the day.
    pub cost: f64,
}

impl CostObservation {
    /// Creates a new observation.
    pub fn new(date: NaiveDate, cost: f64) -> Self {
        Self { date, cost }
    }
}

/// One indexed point of a cleaned cost series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Synthetic ordinal, contiguous from 0.
    pub day_index: usize,
    /// Calendar day of the observation.
    pub date: NaiveDate,
    /// Strictly positive cost.
    pub cost: f64,
}

/// Cleaned, deduplicated and indexed cost series.
///
/// Invariants: indices are `0..len`, dates strictly increase, every cost is
/// finite and greater than zero, and the series is never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSeries {
    points: Vec<SeriesPoint>,
}

impl CostSeries {
    /// Returns the indexed points in ascending date order.
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Number of points in the series.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a built series; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent point.
    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Iterates `(day_index, cost)` pairs.
    pub fn indexed_costs(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.points.iter().map(|p| (p.day_index, p.cost))
    }
}

/// Errors raised while building a cost series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    /// Nothing usable remained after filtering.
    #[error("insufficient data: {remaining} usable observations out of {received}")]
    InsufficientData {
        /// Observations handed to the builder.
        received: usize,
        /// Observations left after filtering and deduplication.
        remaining: usize,
    },
}

/// Builds a [`CostSeries`] from raw observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostSeriesBuilder;

impl CostSeriesBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self
    }

    /// Cleans and indexes raw observations.
    ///
    /// Non-positive and non-finite costs are dropped as "no activity". When a
    /// date repeats, the occurrence latest in input order wins. Calendar gaps
    /// are not reconstructed: the index counts observed days only.
    pub fn build(&self, observations: &[CostObservation]) -> Result<CostSeries, SeriesError> {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut dropped = 0usize;

        for observation in observations {
            if !(observation.cost.is_finite() && observation.cost > 0.0) {
                dropped += 1;
                continue;
            }
            by_date.insert(observation.date, observation.cost);
        }

        if by_date.is_empty() {
            return Err(SeriesError::InsufficientData {
                received: observations.len(),
                remaining: 0,
            });
        }

        let points: Vec<SeriesPoint> = by_date
            .into_iter()
            .enumerate()
            .map(|(day_index, (date, cost))| SeriesPoint { day_index, date, cost })
            .collect();

        debug!(
            received = observations.len(),
            dropped,
            points = points.len(),
            "Built cost series"
        );

        Ok(CostSeries { points })
    }
}
