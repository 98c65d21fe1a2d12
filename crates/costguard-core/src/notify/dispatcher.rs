//! Decides whether a verdict is published and reports the delivery outcome.

use super::Notifier;
use crate::analytics::AnomalyVerdict;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

/// Which verdicts are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertOn {
    /// Only anomalous verdicts.
    #[default]
    Anomaly,
    /// Every verdict, normal ones as a report.
    Always,
}

/// Delivery outcome of one verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertStatus {
    /// The notifier accepted the message.
    Sent,
    /// The verdict did not qualify for publishing.
    Skipped,
    /// Delivery failed; the verdict still stands.
    Failed(String),
}

impl AlertStatus {
    /// JSON form used in invocation bodies.
    pub fn to_json(&self) -> Value {
        match self {
            AlertStatus::Sent => json!("sent"),
            AlertStatus::Skipped => json!("skipped"),
            AlertStatus::Failed(reason) => json!({ "failed": reason }),
        }
    }
}

/// Publishes verdicts to a fixed channel.
pub struct AlertDispatcher {
    notifier: Box<dyn Notifier>,
    channel: String,
    subject: String,
    report_subject: String,
    alert_on: AlertOn,
}

impl AlertDispatcher {
    /// Default subject for anomalous verdicts.
    pub const DEFAULT_SUBJECT: &'static str = "Cost Anomaly Alert";
    /// Subject for normal verdicts when publishing always.
    pub const DEFAULT_REPORT_SUBJECT: &'static str = "Daily Cost Report";

    /// Creates a dispatcher publishing anomalies only.
    pub fn new(notifier: Box<dyn Notifier>, channel: impl Into<String>) -> Self {
        Self {
            notifier,
            channel: channel.into(),
            subject: Self::DEFAULT_SUBJECT.to_string(),
            report_subject: Self::DEFAULT_REPORT_SUBJECT.to_string(),
            alert_on: AlertOn::Anomaly,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn with_alert_on(mut self, alert_on: AlertOn) -> Self {
        self.alert_on = alert_on;
        self
    }

    /// Channel alerts are published to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Which verdicts are published.
    pub fn alert_on(&self) -> AlertOn {
        self.alert_on
    }

    /// Publishes `verdict.message` if it qualifies.
    ///
    /// Never fails: a delivery error is logged and returned as
    /// [`AlertStatus::Failed`].
    pub fn dispatch(&self, verdict: &AnomalyVerdict) -> AlertStatus {
        let subject = match (verdict.is_anomaly, self.alert_on) {
            (true, _) => &self.subject,
            (false, AlertOn::Always) => &self.report_subject,
            (false, AlertOn::Anomaly) => return AlertStatus::Skipped,
        };

        match self.notifier.publish(&self.channel, subject, &verdict.message) {
            Ok(()) => {
                info!(channel = %self.channel, subject = %subject, "Alert published");
                AlertStatus::Sent
            }
            Err(e) => {
                error!(channel = %self.channel, error = %e, "Failed to publish alert");
                AlertStatus::Failed(e.to_string())
            }
        }
    }
}
