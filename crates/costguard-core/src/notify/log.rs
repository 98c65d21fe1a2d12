use super::{Notifier, PublishError};
use tracing::warn;

/// Delivers alerts as `warn` events on the `costguard::alert` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Creates the notifier.
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn publish(&self, channel: &str, subject: &str, message: &str) -> Result<(), PublishError> {
        warn!(target: "costguard::alert", channel, subject, "{}", message);
        Ok(())
    }
}
