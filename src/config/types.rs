//! Core configuration types for a pipeline run
//!
//! `PipelineConfig` is the invocation input of the orchestrator. It is owned
//! by the caller and never persisted with the pipeline state.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::resilience::RetryPolicy;
use crate::selector::SelectorCatalog;

/// Which rule wins when a title matches both keyword sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Any exclude hit makes the title irrelevant.
    #[default]
    ExcludeWins,
    /// Any target hit makes the title relevant, exclude hits notwithstanding.
    TargetWins,
}

/// Relevance keyword configuration.
///
/// Matching is case-insensitive substring matching against the title. An
/// empty target set means every title not excluded is relevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordRules {
    pub target: Vec<String>,
    pub exclude: Vec<String>,
    pub precedence: Precedence,
}

impl KeywordRules {
    pub fn new(
        target: impl IntoIterator<Item = impl Into<String>>,
        exclude: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            target: target.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
            precedence: Precedence::default(),
        }
    }

    #[must_use]
    pub fn with_precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }
}

/// Wall-clock budget per stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub discovery: Duration,
    pub fetch: Duration,
    pub analyze: Duration,
    pub strategize: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            discovery: Duration::from_secs(15 * 60),
            fetch: Duration::from_secs(10 * 60),
            analyze: Duration::from_secs(10 * 60),
            strategize: Duration::from_secs(5 * 60),
        }
    }
}

/// Main configuration struct for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub(crate) topic: String,
    pub(crate) business_context: String,
    pub(crate) business_goals: BTreeMap<String, String>,

    /// Directory holding the persisted state snapshot.
    pub(crate) output_dir: PathBuf,

    pub(crate) list_url: String,
    /// Base that relative item hrefs are joined onto.
    pub(crate) site_base_url: String,
    pub(crate) target_domain_pattern: String,
    /// `target_domain_pattern`, compiled once at build time
    pub(crate) target_domain: Regex,
    pub(crate) keywords: KeywordRules,
    /// Drop non-relevant records instead of keeping them with `relevant = false`.
    pub(crate) relevant_only: bool,
    pub(crate) max_pages: usize,
    pub(crate) record_cap: usize,
    pub(crate) max_consecutive_item_failures: usize,

    pub(crate) selectors: SelectorCatalog,
    pub(crate) selector_retry: RetryPolicy,
    pub(crate) selector_wait: Duration,
    pub(crate) page_load_timeout: Duration,
    pub(crate) headless: bool,
    pub(crate) browser_profile_dir: Option<PathBuf>,

    pub(crate) detail_api_endpoint: String,
    pub(crate) detail_api_key: Option<String>,
    pub(crate) fetch_comments: bool,
    pub(crate) fetch_concurrency: usize,
    pub(crate) fetch_retry: RetryPolicy,
    pub(crate) request_timeout: Duration,
    pub(crate) health_check: bool,
    /// Comments requested per note when `fetch_comments` is set.
    pub(crate) max_comments: usize,
    /// Gap between crawl-task status polls.
    pub(crate) task_poll_interval: Duration,
    /// How long one crawl task may run before the record gives up on it.
    pub(crate) task_max_wait: Duration,

    pub(crate) analysis_endpoint: Option<String>,
    pub(crate) strategy_endpoint: Option<String>,
    /// Records sent for analysis, taken in discovery order.
    pub(crate) analysis_limit: usize,
    pub(crate) analyze_synthetic: bool,

    pub(crate) stage_timeouts: StageTimeouts,
}
