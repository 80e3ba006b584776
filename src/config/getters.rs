//! Getter methods for `PipelineConfig`

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::{KeywordRules, PipelineConfig, StageTimeouts};
use crate::resilience::RetryPolicy;
use crate::selector::SelectorCatalog;
use crate::utils::constants::STATE_FILE_NAME;

impl PipelineConfig {
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn business_context(&self) -> &str {
        &self.business_context
    }

    #[must_use]
    pub fn business_goals(&self) -> &BTreeMap<String, String> {
        &self.business_goals
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the pipeline snapshot is persisted.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.output_dir.join(STATE_FILE_NAME)
    }

    #[must_use]
    pub fn list_url(&self) -> &str {
        &self.list_url
    }

    #[must_use]
    pub fn site_base_url(&self) -> &str {
        &self.site_base_url
    }

    #[must_use]
    pub fn target_domain_pattern(&self) -> &str {
        &self.target_domain_pattern
    }

    #[must_use]
    pub fn target_domain(&self) -> &Regex {
        &self.target_domain
    }

    #[must_use]
    pub fn keywords(&self) -> &KeywordRules {
        &self.keywords
    }

    #[must_use]
    pub fn relevant_only(&self) -> bool {
        self.relevant_only
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn record_cap(&self) -> usize {
        self.record_cap
    }

    #[must_use]
    pub fn max_consecutive_item_failures(&self) -> usize {
        self.max_consecutive_item_failures
    }

    #[must_use]
    pub fn selectors(&self) -> &SelectorCatalog {
        &self.selectors
    }

    #[must_use]
    pub fn selector_retry(&self) -> RetryPolicy {
        self.selector_retry
    }

    #[must_use]
    pub fn selector_wait(&self) -> Duration {
        self.selector_wait
    }

    #[must_use]
    pub fn page_load_timeout(&self) -> Duration {
        self.page_load_timeout
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn browser_profile_dir(&self) -> Option<&Path> {
        self.browser_profile_dir.as_deref()
    }

    #[must_use]
    pub fn detail_api_endpoint(&self) -> &str {
        &self.detail_api_endpoint
    }

    #[must_use]
    pub fn detail_api_key(&self) -> Option<&str> {
        self.detail_api_key.as_deref()
    }

    #[must_use]
    pub fn fetch_comments(&self) -> bool {
        self.fetch_comments
    }

    #[must_use]
    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
    }

    #[must_use]
    pub fn fetch_retry(&self) -> RetryPolicy {
        self.fetch_retry
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn health_check(&self) -> bool {
        self.health_check
    }

    #[must_use]
    pub fn max_comments(&self) -> usize {
        self.max_comments
    }

    #[must_use]
    pub fn task_poll_interval(&self) -> Duration {
        self.task_poll_interval
    }

    #[must_use]
    pub fn task_max_wait(&self) -> Duration {
        self.task_max_wait
    }

    #[must_use]
    pub fn analysis_endpoint(&self) -> Option<&str> {
        self.analysis_endpoint.as_deref()
    }

    #[must_use]
    pub fn strategy_endpoint(&self) -> Option<&str> {
        self.strategy_endpoint.as_deref()
    }

    #[must_use]
    pub fn analysis_limit(&self) -> usize {
        self.analysis_limit
    }

    #[must_use]
    pub fn analyze_synthetic(&self) -> bool {
        self.analyze_synthetic
    }

    #[must_use]
    pub fn stage_timeouts(&self) -> &StageTimeouts {
        &self.stage_timeouts
    }
}
