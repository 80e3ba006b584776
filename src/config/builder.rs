//! Type-safe builder for `PipelineConfig` using the typestate pattern
//!
//! `topic` and `output_dir` are required and must be set in that order
//! before `build()` becomes available. Everything else has a default from
//! `utils::constants`.

use regex::Regex;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use super::types::{KeywordRules, PipelineConfig, StageTimeouts};
use crate::error::{PipelineError, Result};
use crate::resilience::RetryPolicy;
use crate::selector::SelectorCatalog;
use crate::utils::constants::{
    DEFAULT_ANALYSIS_LIMIT, DEFAULT_DETAIL_API_ENDPOINT, DEFAULT_FETCH_ATTEMPTS,
    DEFAULT_FETCH_BACKOFF_MS, DEFAULT_FETCH_CONCURRENCY, DEFAULT_LIST_URL, DEFAULT_MAX_COMMENTS,
    DEFAULT_MAX_CONSECUTIVE_ITEM_FAILURES, DEFAULT_MAX_PAGES, DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
    DEFAULT_RECORD_CAP, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SELECTOR_ATTEMPTS,
    DEFAULT_SELECTOR_BACKOFF_MS, DEFAULT_SELECTOR_WAIT_MS, DEFAULT_SITE_BASE_URL,
    DEFAULT_TARGET_DOMAIN_PATTERN, DEFAULT_TASK_MAX_WAIT_SECS, DEFAULT_TASK_POLL_INTERVAL_MS,
};
use crate::utils::is_valid_url;

// Type states for the builder
pub struct WithTopic;
pub struct Complete;

pub(crate) struct Draft {
    pub(crate) topic: Option<String>,
    pub(crate) business_context: String,
    pub(crate) business_goals: BTreeMap<String, String>,
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) list_url: String,
    pub(crate) site_base_url: String,
    pub(crate) target_domain_pattern: String,
    pub(crate) keywords: KeywordRules,
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
    pub(crate) max_comments: usize,
    pub(crate) task_poll_interval: Duration,
    pub(crate) task_max_wait: Duration,
    pub(crate) analysis_endpoint: Option<String>,
    pub(crate) strategy_endpoint: Option<String>,
    pub(crate) analysis_limit: usize,
    pub(crate) analyze_synthetic: bool,
    pub(crate) stage_timeouts: StageTimeouts,
}

pub struct PipelineConfigBuilder<State = ()> {
    pub(crate) draft: Draft,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for PipelineConfigBuilder<()> {
    fn default() -> Self {
        Self {
            draft: Draft {
                topic: None,
                business_context: String::new(),
                business_goals: BTreeMap::new(),
                output_dir: None,
                list_url: DEFAULT_LIST_URL.to_string(),
                site_base_url: DEFAULT_SITE_BASE_URL.to_string(),
                target_domain_pattern: DEFAULT_TARGET_DOMAIN_PATTERN.to_string(),
                keywords: KeywordRules::default(),
                relevant_only: false,
                max_pages: DEFAULT_MAX_PAGES,
                record_cap: DEFAULT_RECORD_CAP,
                max_consecutive_item_failures: DEFAULT_MAX_CONSECUTIVE_ITEM_FAILURES,
                selectors: SelectorCatalog::default(),
                selector_retry: RetryPolicy::new(
                    DEFAULT_SELECTOR_ATTEMPTS,
                    DEFAULT_SELECTOR_BACKOFF_MS,
                ),
                selector_wait: Duration::from_millis(DEFAULT_SELECTOR_WAIT_MS),
                page_load_timeout: Duration::from_secs(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
                headless: true,
                browser_profile_dir: None,
                detail_api_endpoint: DEFAULT_DETAIL_API_ENDPOINT.to_string(),
                detail_api_key: None,
                fetch_comments: false,
                fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
                fetch_retry: RetryPolicy::new(DEFAULT_FETCH_ATTEMPTS, DEFAULT_FETCH_BACKOFF_MS)
                    .with_jitter(250),
                request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
                health_check: true,
                max_comments: DEFAULT_MAX_COMMENTS,
                task_poll_interval: Duration::from_millis(DEFAULT_TASK_POLL_INTERVAL_MS),
                task_max_wait: Duration::from_secs(DEFAULT_TASK_MAX_WAIT_SECS),
                analysis_endpoint: None,
                strategy_endpoint: None,
                analysis_limit: DEFAULT_ANALYSIS_LIMIT,
                analyze_synthetic: false,
                stage_timeouts: StageTimeouts::default(),
            },
            _phantom: PhantomData,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder<()> {
        PipelineConfigBuilder::default()
    }
}

impl PipelineConfigBuilder<()> {
    pub fn topic(self, topic: impl Into<String>) -> PipelineConfigBuilder<WithTopic> {
        let mut draft = self.draft;
        draft.topic = Some(topic.into());
        PipelineConfigBuilder {
            draft,
            _phantom: PhantomData,
        }
    }
}

impl PipelineConfigBuilder<WithTopic> {
    pub fn output_dir(self, dir: impl Into<PathBuf>) -> PipelineConfigBuilder<Complete> {
        let mut draft = self.draft;
        draft.output_dir = Some(dir.into());
        PipelineConfigBuilder {
            draft,
            _phantom: PhantomData,
        }
    }
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::Config(msg.into())
}

fn check_endpoint(name: &str, value: &str) -> Result<()> {
    if is_valid_url(value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} is not an http(s) url: '{value}'")))
    }
}

impl PipelineConfigBuilder<Complete> {
    pub fn build(self) -> Result<PipelineConfig> {
        let d = self.draft;

        let topic = d.topic.unwrap_or_default().trim().to_string();
        if topic.is_empty() {
            return Err(invalid("topic must not be empty"));
        }
        let output_dir = d
            .output_dir
            .ok_or_else(|| invalid("output_dir must be set"))?;

        if d.max_pages == 0 {
            return Err(invalid("max_pages must be at least 1"));
        }
        if d.record_cap == 0 {
            return Err(invalid("record_cap must be at least 1"));
        }
        if d.fetch_concurrency == 0 {
            return Err(invalid("fetch_concurrency must be at least 1"));
        }
        if d.analysis_limit == 0 {
            return Err(invalid("analysis_limit must be at least 1"));
        }
        if d.task_poll_interval.is_zero() {
            return Err(invalid("task_poll_interval must be non-zero"));
        }
        if d.max_consecutive_item_failures == 0 {
            return Err(invalid("max_consecutive_item_failures must be at least 1"));
        }
        let empty = d.selectors.empty_keys();
        if !empty.is_empty() {
            return Err(invalid(format!("selectors without candidates: {empty:?}")));
        }

        check_endpoint("list_url", &d.list_url)?;
        check_endpoint("site_base_url", &d.site_base_url)?;
        check_endpoint("detail_api_endpoint", &d.detail_api_endpoint)?;
        if let Some(ref ep) = d.analysis_endpoint {
            check_endpoint("analysis_endpoint", ep)?;
        }
        if let Some(ref ep) = d.strategy_endpoint {
            check_endpoint("strategy_endpoint", ep)?;
        }

        let target_domain = Regex::new(&d.target_domain_pattern).map_err(|e| {
            invalid(format!(
                "invalid target domain pattern '{}': {e}",
                d.target_domain_pattern
            ))
        })?;

        Ok(PipelineConfig {
            topic,
            business_context: d.business_context,
            business_goals: d.business_goals,
            output_dir,
            list_url: d.list_url,
            site_base_url: d.site_base_url,
            target_domain_pattern: d.target_domain_pattern,
            target_domain,
            keywords: d.keywords,
            relevant_only: d.relevant_only,
            max_pages: d.max_pages,
            record_cap: d.record_cap,
            max_consecutive_item_failures: d.max_consecutive_item_failures,
            selectors: d.selectors,
            selector_retry: d.selector_retry,
            selector_wait: d.selector_wait,
            page_load_timeout: d.page_load_timeout,
            headless: d.headless,
            browser_profile_dir: d.browser_profile_dir,
            detail_api_endpoint: d.detail_api_endpoint,
            detail_api_key: d.detail_api_key.filter(|k| !k.trim().is_empty()),
            fetch_comments: d.fetch_comments,
            fetch_concurrency: d.fetch_concurrency,
            fetch_retry: d.fetch_retry,
            request_timeout: d.request_timeout,
            health_check: d.health_check,
            max_comments: d.max_comments,
            task_poll_interval: d.task_poll_interval,
            task_max_wait: d.task_max_wait,
            analysis_endpoint: d.analysis_endpoint,
            strategy_endpoint: d.strategy_endpoint,
            analysis_limit: d.analysis_limit,
            analyze_synthetic: d.analyze_synthetic,
            stage_timeouts: d.stage_timeouts,
        })
    }
}
