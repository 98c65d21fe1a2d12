//! JSON webhook notifier.

use super::{Notifier, PublishError};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    subject: &'a str,
    message: &'a str,
}

/// Posts `{channel, subject, message}` to a URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
    url: String,
    token: Option<String>,
}

impl WebhookNotifier {
    /// Creates a notifier for `url` with a request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            token: None,
        })
    }

    /// Sends a bearer token with each request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn publish(&self, channel: &str, subject: &str, message: &str) -> Result<(), PublishError> {
        let payload = WebhookPayload {
            channel,
            subject,
            message,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %self.url, channel, "Webhook alert delivered");
        Ok(())
    }
}
