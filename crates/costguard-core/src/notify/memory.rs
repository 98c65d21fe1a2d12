use super::{Notifier, PublishError};
use std::sync::{Arc, Mutex};

/// A message captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination channel.
    pub channel: String,
    /// Alert subject line.
    pub subject: String,
    /// Alert body.
    pub message: String,
}

/// Records every publish attempt; optionally fails each one.
///
/// Clones share the recorded list, so a test can keep a handle after handing
/// the notifier to a pipeline.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    failure: Option<PublishError>,
}

impl RecordingNotifier {
    /// A notifier that records every publish and succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose publishes are recorded and then fail with `error`.
    pub fn failing(error: PublishError) -> Self {
        Self {
            published: Arc::default(),
            failure: Some(error),
        }
    }

    /// Messages published so far, including failed attempts.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }

    /// Number of publish attempts.
    pub fn count(&self) -> usize {
        self.published().len()
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, channel: &str, subject: &str, message: &str) -> Result<(), PublishError> {
        self.published
            .lock()
            .map_err(|_| PublishError::Unavailable("recorder lock poisoned".to_string()))?
            .push(PublishedMessage {
                channel: channel.to_string(),
                subject: subject.to_string(),
                message: message.to_string(),
            });

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
