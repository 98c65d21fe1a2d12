//! Anomaly detection by comparing a realized cost against a baseline.

use super::policy::{
    DeviationPolicy, EvaluationContext, PolicyConfig, PolicyKind, PolicyOutcome,
    ThresholdConfigError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of one anomaly evaluation.
///
/// For the relative-increase policy `predicted_cost` holds the previous
/// period's cost and `actual_cost` the current period's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    /// Forecast (or previous-period) cost.
    pub predicted_cost: f64,
    /// Realized (or current-period) cost.
    pub actual_cost: f64,
    /// Bound that was applied: a cost for absolute, a percent for relative.
    pub threshold: f64,
    /// Ratio (absolute) or increase percent (relative).
    pub increase_or_ratio: f64,
    /// Whether the cost is anomalous.
    pub is_anomaly: bool,
    /// Policy that produced the verdict.
    pub policy: PolicyKind,
    /// Human-readable summary.
    pub message: String,
    /// When the evaluation ran.
    pub evaluated_at: DateTime<Utc>,
}

/// Evaluates a configured deviation policy and formats the verdict.
///
/// Holds no mutable state: identical inputs give identical verdicts apart
/// from `evaluated_at`.
#[derive(Debug)]
pub struct AnomalyDetector {
    policy: Box<dyn DeviationPolicy>,
}

impl AnomalyDetector {
    /// Creates a detector for the configured policy.
    pub fn new(config: &PolicyConfig) -> Result<Self, ThresholdConfigError> {
        Ok(Self {
            policy: config.build()?,
        })
    }

    /// Creates a detector around an already-built policy.
    pub fn with_policy(policy: Box<dyn DeviationPolicy>) -> Self {
        Self { policy }
    }

    /// Policy kind in use.
    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    /// Evaluates `observed` against `baseline`, stamped with the current time.
    pub fn detect(&self, baseline: f64, observed: f64) -> AnomalyVerdict {
        self.detect_at(baseline, observed, Utc::now())
    }

    /// Evaluates `observed` against `baseline` with an explicit timestamp.
    pub fn detect_at(
        &self,
        baseline: f64,
        observed: f64,
        evaluated_at: DateTime<Utc>,
    ) -> AnomalyVerdict {
        let outcome = self
            .policy
            .evaluate(&EvaluationContext::new(baseline, observed));
        let message = self.format_message(baseline, observed, &outcome);

        if outcome.is_anomaly {
            warn!(
                policy = %self.policy.kind(),
                baseline,
                observed,
                threshold = outcome.threshold,
                "Cost anomaly detected"
            );
        } else {
            debug!(policy = %self.policy.kind(), baseline, observed, "Cost within bounds");
        }

        AnomalyVerdict {
            predicted_cost: baseline,
            actual_cost: observed,
            threshold: outcome.threshold,
            increase_or_ratio: outcome.increase_or_ratio,
            is_anomaly: outcome.is_anomaly,
            policy: self.policy.kind(),
            message,
            evaluated_at,
        }
    }

    fn format_message(&self, baseline: f64, observed: f64, outcome: &PolicyOutcome) -> String {
        match (self.policy.kind(), outcome.is_anomaly) {
            (PolicyKind::AbsoluteThreshold, true) => format!(
                "Anomaly detected! Actual cost ${:.4} > predicted ${:.4} ({:+.0}%), threshold ${:.4}",
                observed,
                baseline,
                (self.policy.parameter() - 1.0) * 100.0,
                outcome.threshold
            ),
            (PolicyKind::AbsoluteThreshold, false) => format!(
                "Cost is normal. Actual: ${:.4}, Predicted: ${:.4}",
                observed, baseline
            ),
            (PolicyKind::RelativeIncrease, true) => format!(
                "[ALERT] Cost up by {:.2}% (threshold {:.2}%) | Previous: ${:.4}, Current: ${:.4}",
                outcome.increase_or_ratio, outcome.threshold, baseline, observed
            ),
            (PolicyKind::RelativeIncrease, false) => format!(
                "Cost is normal. Change: {:+.2}% | Previous: ${:.4}, Current: ${:.4}",
                outcome.increase_or_ratio, baseline, observed
            ),
        }
    }
}

/// One-shot detection for callers that hold only a policy configuration.
pub fn detect(
    baseline: f64,
    observed: f64,
    config: &PolicyConfig,
) -> Result<AnomalyVerdict, ThresholdConfigError> {
    Ok(AnomalyDetector::new(config)?.detect(baseline, observed))
}
