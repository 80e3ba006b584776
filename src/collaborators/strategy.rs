use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analysis::{AnalysisResult, BusinessContext};
use super::summary::AnalysisSummary;
use crate::error::{PipelineError, Result};

/// Everything the strategist sees.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInput<'a> {
    pub context: &'a BusinessContext,
    pub analyses: &'a [AnalysisResult],
    pub summary: &'a AnalysisSummary,
}

#[async_trait]
pub trait Strategist: Send + Sync {
    async fn strategize(&self, input: &StrategyInput<'_>) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDocument {
    pub payload: Value,
}

impl StrategyDocument {
    /// A strategy must be a non-empty JSON object.
    pub fn from_payload(payload: Value) -> Result<Self> {
        match payload.as_object() {
            Some(fields) if !fields.is_empty() => Ok(Self { payload }),
            Some(_) => Err(PipelineError::collaborator("strategy", "empty strategy document")),
            None => Err(PipelineError::collaborator(
                "strategy",
                "strategy document is not a JSON object",
            )),
        }
    }
}
