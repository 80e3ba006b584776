//! Error taxonomy for the discovery and orchestration pipeline
//!
//! `PipelineError` is what stage code returns; `ErrorKind` is its
//! serialisable tag, stored in the persisted error log so snapshot readers can
//! branch on the failure class without parsing messages.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failure classes recorded in the pipeline error log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ElementNotFound,
    NavigationTimeout,
    RecordValidationFailure,
    NoRecordsFound,
    FetchFailure,
    CollaboratorError,
    Browser,
    Persistence,
    Config,
    InvariantViolation,
    StageTimeout,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Every candidate locator was tried for the full attempt budget.
    #[error("element '{key}' not found after {attempts} sweep(s) over {candidates} candidate(s)")]
    ElementNotFound {
        key: String,
        candidates: usize,
        attempts: u32,
    },

    #[error("navigation to '{target}' not confirmed within {timeout:?}")]
    NavigationTimeout { target: String, timeout: Duration },

    #[error("record '{record}' rejected: {reason}")]
    RecordValidationFailure { record: String, reason: String },

    #[error("no usable records at stage {stage}")]
    NoRecordsFound { stage: String },

    #[error("detail fetch failed for '{url}': {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("{collaborator} collaborator error: {message}")]
    CollaboratorError {
        collaborator: String,
        message: String,
    },

    #[error("stage {stage} exceeded its {timeout:?} budget")]
    StageTimeout { stage: String, timeout: Duration },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("state persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            Self::NavigationTimeout { .. } => ErrorKind::NavigationTimeout,
            Self::RecordValidationFailure { .. } => ErrorKind::RecordValidationFailure,
            Self::NoRecordsFound { .. } => ErrorKind::NoRecordsFound,
            Self::FetchFailure { .. } => ErrorKind::FetchFailure,
            Self::CollaboratorError { .. } => ErrorKind::CollaboratorError,
            Self::StageTimeout { .. } => ErrorKind::StageTimeout,
            Self::Browser(_) => ErrorKind::Browser,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Config(_) => ErrorKind::Config,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }

    /// Record identity attached to per-record failures, if any.
    #[must_use]
    pub fn record(&self) -> Option<&str> {
        match self {
            Self::RecordValidationFailure { record, .. } => Some(record),
            Self::FetchFailure { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CollaboratorError {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }
}

/// Browser automation failures arrive as `anyhow` chains; keep the whole chain.
impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Browser(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
