//! Request/response shaped result of one pipeline invocation.

use crate::error::{CostGuardError, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// `{status_code, body}` returned to the caller of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// 200 on a completed run, 5xx on a fatal error.
    pub status_code: u16,
    /// JSON payload.
    pub body: Value,
}

impl InvocationResult {
    /// Successful run.
    pub fn ok(body: Value) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    /// Fatal run. The body keeps the originating error kind.
    ///
    /// Upstream failures map to 502 so a scheduler can tell them apart and
    /// retry; everything else is a 500.
    pub fn from_error(err: &CostGuardError) -> Self {
        let kind = err.kind();
        let status_code = match kind {
            ErrorKind::UpstreamService => 502,
            _ => 500,
        };

        Self {
            status_code,
            body: json!({
                "error": err.to_string(),
                "kind": kind.as_str(),
            }),
        }
    }

    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        self.status_code < 500
    }

    /// Error kind string for a failed run.
    pub fn error_kind(&self) -> Option<&str> {
        self.body.get("kind").and_then(Value::as_str)
    }
}
