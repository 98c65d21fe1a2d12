//! Alert delivery.
//!
//! A [`Notifier`] pushes a message to a channel. The [`AlertDispatcher`]
//! decides whether a verdict is published at all and reports the delivery
//! outcome without failing the run.

mod dispatcher;
mod log;
mod memory;
mod webhook;

pub use dispatcher::{AlertDispatcher, AlertOn, AlertStatus};
pub use log::LogNotifier;
pub use memory::{PublishedMessage, RecordingNotifier};
pub use webhook::WebhookNotifier;

use thiserror::Error;

/// Notification delivery errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The request never reached the channel.
    #[error("transport error: {0}")]
    Transport(String),

    /// The channel answered with a non-success status.
    #[error("channel rejected message with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The notifier cannot deliver at all.
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// Publishes a message to a notification channel.
///
/// Delivery is at-least-once; receivers must tolerate duplicates.
pub trait Notifier: Send + Sync {
    /// Publishes `message` with `subject` to `channel`.
    fn publish(&self, channel: &str, subject: &str, message: &str) -> Result<(), PublishError>;
}
