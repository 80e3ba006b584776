//! JSON-over-HTTP collaborator clients

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::analysis::{Analyzer, BusinessContext};
use super::strategy::{StrategyInput, Strategist};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::records::DetailedRecord;

const ANALYSIS: &str = "analysis";
const STRATEGY: &str = "strategy";

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {e}")))
}

fn required<'a>(endpoint: Option<&'a str>, name: &str) -> Result<&'a str> {
    endpoint.ok_or_else(|| PipelineError::Config(format!("{name} endpoint is not configured")))
}

/// POST `body` and return the JSON response. Responses wrapped as
/// `{"success": true, "data": {...}}` are unwrapped.
async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    endpoint: &str,
    collaborator: &str,
    body: &B,
) -> Result<Value> {
    debug!("POST {endpoint} ({collaborator})");
    let resp = client
        .post(endpoint)
        .json(body)
        .send()
        .await
        .map_err(|e| PipelineError::collaborator(collaborator, format!("request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(PipelineError::collaborator(
            collaborator,
            format!("HTTP {}: {text}", status.as_u16()),
        ));
    }

    let value: Value = resp
        .json()
        .await
        .map_err(|e| PipelineError::collaborator(collaborator, format!("invalid JSON: {e}")))?;

    match value {
        Value::Object(mut envelope) if envelope.contains_key("success") => {
            if envelope.get("success").and_then(Value::as_bool) != Some(true) {
                let message = envelope
                    .get("message")
                    .or_else(|| envelope.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(PipelineError::collaborator(collaborator, message));
            }
            Ok(envelope.remove("data").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    context: &'a BusinessContext,
    record: &'a DetailedRecord,
}

pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            required(config.analysis_endpoint(), ANALYSIS)?,
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, record: &DetailedRecord, context: &BusinessContext) -> Result<Value> {
        post_json(
            &self.client,
            &self.endpoint,
            ANALYSIS,
            &AnalyzeRequest { context, record },
        )
        .await
    }
}

pub struct HttpStrategist {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStrategist {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            required(config.strategy_endpoint(), STRATEGY)?,
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl Strategist for HttpStrategist {
    async fn strategize(&self, input: &StrategyInput<'_>) -> Result<Value> {
        post_json(&self.client, &self.endpoint, STRATEGY, input).await
    }
}
