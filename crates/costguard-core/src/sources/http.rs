//! Cost-explorer style HTTP source.

use super::{CostAmount, CostDataSource, Granularity, SourceError, TimeRange};
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Metric requested from the billing endpoint.
pub const UNBLENDED_COST: &str = "UnblendedCost";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CostAndUsageResponse {
    results_by_time: Vec<ResultByTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultByTime {
    time_period: TimePeriod,
    total: Total,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TimePeriod {
    start: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Total {
    unblended_cost: MetricValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetricValue {
    amount: String,
}

/// Fetches costs from an HTTP endpoint returning a `ResultsByTime` document.
#[derive(Debug, Clone)]
pub struct HttpCostSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpCostSource {
    /// Creates a source for `url` with a request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Upstream(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Parses a `ResultsByTime` body into amounts.
    ///
    /// `TimePeriod.Start` may be a date or a timestamp; only the date part is
    /// kept. Amounts are decimal strings.
    pub fn parse_results(body: &str) -> Result<Vec<CostAmount>, SourceError> {
        let response: CostAndUsageResponse = serde_json::from_str(body)
            .map_err(|e| SourceError::Upstream(format!("unexpected response body: {}", e)))?;

        response
            .results_by_time
            .into_iter()
            .map(|result| {
                let start = &result.time_period.start;
                let date_part = start.get(..10).unwrap_or(start);
                let period_start = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
                    SourceError::Upstream(format!("invalid period start '{}': {}", start, e))
                })?;
                let raw = &result.total.unblended_cost.amount;
                let amount = raw.trim().parse::<f64>().map_err(|e| {
                    SourceError::Upstream(format!("invalid amount '{}': {}", raw, e))
                })?;

                Ok(CostAmount {
                    period_start,
                    amount,
                })
            })
            .collect()
    }
}

impl CostDataSource for HttpCostSource {
    fn fetch(
        &self,
        range: &TimeRange,
        granularity: Granularity,
    ) -> Result<Vec<CostAmount>, SourceError> {
        let start = range.start().format("%Y-%m-%d").to_string();
        let end = range.end().format("%Y-%m-%d").to_string();

        debug!(url = %self.url, %range, %granularity, "Fetching cost and usage");

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("granularity", granularity.as_str()),
                ("metric", UNBLENDED_COST),
            ])
            .send()
            .map_err(|e| SourceError::Upstream(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SourceError::Upstream(format!("failed to read response: {}", e)))?;

        if status == StatusCode::BAD_REQUEST {
            return Err(SourceError::InvalidRange(format!("{} rejected: {}", range, body)));
        }
        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "Cost source returned an error");
            return Err(SourceError::Upstream(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        Self::parse_results(&body)
    }
}
