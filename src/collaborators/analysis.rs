use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::records::DetailedRecord;

/// Topic and goals passed to every collaborator call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub topic: String,
    pub business_context: String,
    pub business_goals: BTreeMap<String, String>,
}

impl BusinessContext {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            topic: config.topic().to_string(),
            business_context: config.business_context().to_string(),
            business_goals: config.business_goals().clone(),
        }
    }
}

/// Scores one detailed record. The returned payload is validated by
/// [`AnalysisResult::from_payload`].
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, record: &DetailedRecord, context: &BusinessContext) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub url: String,
    pub title: String,
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub success_factors: Vec<String>,
    /// The collaborator's full response.
    pub payload: Value,
}

impl AnalysisResult {
    /// Accepts any JSON object. `overall_score`, when present, must be a
    /// number in 0..=100; `success_factors`, when present, a list of strings.
    pub fn from_payload(record: &DetailedRecord, payload: Value) -> Result<Self> {
        let malformed = |reason: &str| {
            PipelineError::collaborator("analysis", format!("{reason} for '{}'", record.url()))
        };

        let Some(fields) = payload.as_object() else {
            return Err(malformed("payload is not a JSON object"));
        };
        if fields.is_empty() {
            return Err(malformed("empty payload"));
        }

        let overall_score = match fields.get("overall_score") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(score) if (0.0..=100.0).contains(&score) => Some(score),
                _ => return Err(malformed("overall_score outside 0..=100")),
            },
            Some(_) => return Err(malformed("overall_score is not a number")),
        };

        let success_factors = match fields.get("success_factors") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| malformed("success_factors must be strings"))?,
            Some(_) => return Err(malformed("success_factors is not a list")),
        };

        Ok(Self {
            url: record.url().to_string(),
            title: record.source.title.clone(),
            overall_score,
            success_factors,
            payload,
        })
    }
}
