//! Cost data sources.
//!
//! A [`CostDataSource`] fetches billed amounts for a time window. Sources are
//! blocking and are only ever called from the pipeline layer.

mod file;
mod http;
mod memory;

pub use file::JsonFileCostSource;
pub use http::HttpCostSource;
pub use memory::InMemoryCostSource;

use crate::analytics::CostObservation;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by cost data sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Transport, authentication or payload failure upstream. Transient.
    #[error("upstream service error: {0}")]
    Upstream(String),

    /// The requested window is malformed.
    #[error("invalid time range: {0}")]
    InvalidRange(String),
}

/// Half-open date window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TimeRange {
    /// Creates a window, rejecting `start >= end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, SourceError> {
        if start >= end {
            return Err(SourceError::InvalidRange(format!(
                "start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` days before `today`, excluding today.
    pub fn last_days(today: NaiveDate, days: u32) -> Result<Self, SourceError> {
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| SourceError::InvalidRange(format!("{} days before {}", days, today)))?;
        Self::new(start, today)
    }

    /// Yesterday, as a one-day window ending today.
    pub fn previous_day(today: NaiveDate) -> Result<Self, SourceError> {
        Self::last_days(today, 1)
    }

    /// Inclusive start.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive end.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Bucket size of fetched amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One amount per day.
    #[default]
    Daily,
    /// One amount per hour.
    Hourly,
}

impl Granularity {
    /// Wire name used by billing APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "DAILY",
            Granularity::Hourly => "HOURLY",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billed amount for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostAmount {
    /// Day the period starts on.
    pub period_start: NaiveDate,
    /// Unblended cost for the period.
    pub amount: f64,
}

impl From<CostAmount> for CostObservation {
    fn from(value: CostAmount) -> Self {
        CostObservation::new(value.period_start, value.amount)
    }
}

/// Fetches billed amounts for a window.
pub trait CostDataSource: Send + Sync {
    /// Returns amounts ordered by period start.
    fn fetch(
        &self,
        range: &TimeRange,
        granularity: Granularity,
    ) -> Result<Vec<CostAmount>, SourceError>;
}
