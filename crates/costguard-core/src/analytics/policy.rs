//! Deviation policies deciding whether a realized cost is anomalous.
//!
//! Two incompatible conventions exist in practice: comparing an actual cost
//! against a forecast scaled by a multiplier, and comparing the current period
//! against the previous one by percent increase. Both are kept as named
//! policies and a deployment selects exactly one through [`PolicyConfig`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default multiplier for [`AbsoluteThreshold`] (30% over forecast).
pub const DEFAULT_MULTIPLIER: f64 = 1.3;

/// Default percent for [`RelativeIncrease`].
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 20.0;

/// Which deviation rule a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// `actual > predicted * multiplier`.
    AbsoluteThreshold,
    /// `increase_percent >= threshold_percent` over the previous period.
    RelativeIncrease,
}

impl PolicyKind {
    /// Converts the kind to its configuration string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::AbsoluteThreshold => "absolute_threshold",
            PolicyKind::RelativeIncrease => "relative_increase",
        }
    }

    /// Default multiplier or percent for this kind.
    pub fn default_value(&self) -> f64 {
        match self {
            PolicyKind::AbsoluteThreshold => DEFAULT_MULTIPLIER,
            PolicyKind::RelativeIncrease => DEFAULT_THRESHOLD_PERCENT,
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "absolute_threshold" | "absolute" => Ok(PolicyKind::AbsoluteThreshold),
            "relative_increase" | "relative" => Ok(PolicyKind::RelativeIncrease),
            other => Err(format!(
                "unknown policy kind '{}' (expected absolute_threshold or relative_increase)",
                other
            )),
        }
    }
}

/// Rejected threshold configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {kind} threshold {value}: must be a finite number greater than zero")]
pub struct ThresholdConfigError {
    /// Policy the value was configured for.
    pub kind: PolicyKind,
    /// Offending value.
    pub value: f64,
}

/// Deployment-level policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Which rule to apply.
    pub kind: PolicyKind,
    /// Multiplier (absolute) or percent (relative). `None` uses the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::AbsoluteThreshold,
            value: None,
        }
    }
}

impl PolicyConfig {
    /// Absolute-threshold policy with the given multiplier.
    pub fn absolute(multiplier: f64) -> Self {
        Self {
            kind: PolicyKind::AbsoluteThreshold,
            value: Some(multiplier),
        }
    }

    /// Relative-increase policy with the given percent.
    pub fn relative(threshold_percent: f64) -> Self {
        Self {
            kind: PolicyKind::RelativeIncrease,
            value: Some(threshold_percent),
        }
    }

    /// Effective multiplier or percent.
    pub fn effective_value(&self) -> f64 {
        self.value.unwrap_or_else(|| self.kind.default_value())
    }

    /// Rejects zero, negative and non-finite values.
    pub fn validate(&self) -> Result<(), ThresholdConfigError> {
        let value = self.effective_value();
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(ThresholdConfigError {
                kind: self.kind,
                value,
            })
        }
    }

    /// Builds the configured policy.
    pub fn build(&self) -> Result<Box<dyn DeviationPolicy>, ThresholdConfigError> {
        self.validate()?;
        let value = self.effective_value();
        Ok(match self.kind {
            PolicyKind::AbsoluteThreshold => Box::new(AbsoluteThreshold { multiplier: value }),
            PolicyKind::RelativeIncrease => Box::new(RelativeIncrease {
                threshold_percent: value,
            }),
        })
    }
}

/// Values a policy is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationContext {
    /// Predicted cost (absolute) or previous-period cost (relative).
    pub baseline: f64,
    /// Actual cost (absolute) or current-period cost (relative).
    pub observed: f64,
}

impl EvaluationContext {
    /// Creates a new context.
    pub fn new(baseline: f64, observed: f64) -> Self {
        Self { baseline, observed }
    }
}

/// Result of evaluating a policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolicyOutcome {
    /// Whether the observed value is anomalous.
    pub is_anomaly: bool,
    /// Observed/baseline ratio (absolute) or increase percent (relative).
    pub increase_or_ratio: f64,
    /// Cost bound (absolute) or percent bound (relative) that was applied.
    pub threshold: f64,
}

/// A rule classifying an observed cost against a baseline.
pub trait DeviationPolicy: fmt::Debug + Send + Sync {
    /// Which rule this is.
    fn kind(&self) -> PolicyKind;

    /// Configured multiplier or percent.
    fn parameter(&self) -> f64;

    /// Evaluates the rule. Total: never fails.
    fn evaluate(&self, context: &EvaluationContext) -> PolicyOutcome;
}

/// Flags `actual > predicted * multiplier`. A value exactly at the bound is
/// not anomalous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteThreshold {
    multiplier: f64,
}

impl AbsoluteThreshold {
    /// Creates the policy, rejecting a non-positive multiplier.
    pub fn new(multiplier: f64) -> Result<Self, ThresholdConfigError> {
        PolicyConfig::absolute(multiplier).validate()?;
        Ok(Self { multiplier })
    }
}

impl DeviationPolicy for AbsoluteThreshold {
    fn kind(&self) -> PolicyKind {
        PolicyKind::AbsoluteThreshold
    }

    fn parameter(&self) -> f64 {
        self.multiplier
    }

    fn evaluate(&self, context: &EvaluationContext) -> PolicyOutcome {
        let threshold = context.baseline * self.multiplier;
        let ratio = if context.baseline == 0.0 {
            0.0
        } else {
            context.observed / context.baseline
        };

        PolicyOutcome {
            is_anomaly: context.observed > threshold,
            increase_or_ratio: ratio,
            threshold,
        }
    }
}

/// Flags a period-over-period increase of at least `threshold_percent`. A
/// zero previous cost is defined as "no increase".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeIncrease {
    threshold_percent: f64,
}

impl RelativeIncrease {
    /// Creates the policy, rejecting a non-positive percent.
    pub fn new(threshold_percent: f64) -> Result<Self, ThresholdConfigError> {
        PolicyConfig::relative(threshold_percent).validate()?;
        Ok(Self { threshold_percent })
    }

    /// Percent change from `previous` to `current`, 0 when `previous` is 0.
    pub fn increase_percent(previous: f64, current: f64) -> f64 {
        if previous == 0.0 {
            0.0
        } else {
            (current - previous) / previous * 100.0
        }
    }
}

impl DeviationPolicy for RelativeIncrease {
    fn kind(&self) -> PolicyKind {
        PolicyKind::RelativeIncrease
    }

    fn parameter(&self) -> f64 {
        self.threshold_percent
    }

    fn evaluate(&self, context: &EvaluationContext) -> PolicyOutcome {
        let increase = Self::increase_percent(context.baseline, context.observed);
        PolicyOutcome {
            is_anomaly: increase >= self.threshold_percent,
            increase_or_ratio: increase,
            threshold: self.threshold_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_threshold_is_strict() {
        let policy = AbsoluteThreshold::new(1.3).unwrap();

        let at_bound = policy.evaluate(&EvaluationContext::new(100.0, 130.0));
        assert!(!at_bound.is_anomaly);
        assert!((at_bound.threshold - 130.0).abs() < 1e-9);

        let above = policy.evaluate(&EvaluationContext::new(100.0, 130.01));
        assert!(above.is_anomaly);
    }

    #[test]
    fn test_absolute_threshold_ratio() {
        let policy = AbsoluteThreshold::new(1.3).unwrap();
        let outcome = policy.evaluate(&EvaluationContext::new(50.0, 75.0));
        assert!((outcome.increase_or_ratio - 1.5).abs() < 1e-9);
        assert!(outcome.is_anomaly);

        let zero_baseline = policy.evaluate(&EvaluationContext::new(0.0, 5.0));
        assert_eq!(zero_baseline.increase_or_ratio, 0.0);
        assert!(zero_baseline.is_anomaly);
    }

    #[test]
    fn test_relative_increase_is_inclusive() {
        let policy = RelativeIncrease::new(20.0).unwrap();

        assert!(policy.evaluate(&EvaluationContext::new(100.0, 121.0)).is_anomaly);
        assert!(!policy.evaluate(&EvaluationContext::new(100.0, 119.0)).is_anomaly);
        assert!(policy.evaluate(&EvaluationContext::new(50.0, 60.0)).is_anomaly);
    }

    #[test]
    fn test_relative_increase_zero_previous_is_no_increase() {
        let policy = RelativeIncrease::new(20.0).unwrap();
        let outcome = policy.evaluate(&EvaluationContext::new(0.0, 50.0));

        assert!(!outcome.is_anomaly);
        assert_eq!(outcome.increase_or_ratio, 0.0);
    }

    #[test]
    fn test_relative_increase_decrease_is_negative() {
        assert!((RelativeIncrease::increase_percent(100.0, 80.0) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_policy_config_defaults() {
        let config = PolicyConfig::default();
        assert_eq!(config.kind, PolicyKind::AbsoluteThreshold);
        assert!((config.effective_value() - DEFAULT_MULTIPLIER).abs() < f64::EPSILON);

        let relative = PolicyConfig {
            kind: PolicyKind::RelativeIncrease,
            value: None,
        };
        assert!((relative.effective_value() - DEFAULT_THRESHOLD_PERCENT).abs() < f64::EPSILON);
    }

    #[test]
    fn test_policy_config_rejects_non_positive() {
        for value in [0.0, -1.3, f64::NAN, f64::INFINITY] {
            let err = PolicyConfig::absolute(value).validate().unwrap_err();
            assert_eq!(err.kind, PolicyKind::AbsoluteThreshold);
        }
        assert!(PolicyConfig::relative(-5.0).build().is_err());
        assert!(RelativeIncrease::new(0.0).is_err());
    }

    #[test]
    fn test_policy_config_builds_selected_variant() {
        let policy = PolicyConfig::relative(15.0).build().unwrap();
        assert_eq!(policy.kind(), PolicyKind::RelativeIncrease);
        assert!((policy.parameter() - 15.0).abs() < f64::EPSILON);

        let policy = PolicyConfig::default().build().unwrap();
        assert_eq!(policy.kind(), PolicyKind::AbsoluteThreshold);
    }

    #[test]
    fn test_policy_kind_parsing() {
        assert_eq!("absolute".parse::<PolicyKind>().unwrap(), PolicyKind::AbsoluteThreshold);
        assert_eq!(
            "Relative-Increase".parse::<PolicyKind>().unwrap(),
            PolicyKind::RelativeIncrease
        );
        assert!("zscore".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_policy_config_deserialize() {
        let config: PolicyConfig =
            toml::from_str("kind = \"relative_increase\"\nvalue = 25.0").unwrap();
        assert_eq!(config, PolicyConfig::relative(25.0));

        let config: PolicyConfig = toml::from_str("kind = \"absolute_threshold\"").unwrap();
        assert_eq!(config.value, None);
    }
}
