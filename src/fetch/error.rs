use std::time::Duration;
use thiserror::Error;

/// Why one detail request failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection-level failure: refused, reset, DNS.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The API answered `success: false`.
    #[error("API reported failure: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    /// A crawl task ended without producing content.
    #[error("crawl task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("crawl task {task_id} unfinished after {waited:?}")]
    TaskTimedOut { task_id: String, waited: Duration },
}

impl FetchError {
    /// Transport failures, timeouts, 429 and 5xx may succeed on a later attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            // A retry would start another crawl task for the same note.
            Self::Rejected(_)
            | Self::Malformed(_)
            | Self::TaskFailed { .. }
            | Self::TaskTimedOut { .. } => false,
        }
    }

    /// The API could not be reached at all, as opposed to answering badly.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}
