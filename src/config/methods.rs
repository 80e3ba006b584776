//! Builder methods available for all states
//!
//! This module contains setters that can be called on the builder
//! regardless of its current type state, plus the environment overlay.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::builder::PipelineConfigBuilder;
use super::types::{KeywordRules, StageTimeouts};
use crate::error::{PipelineError, Result};
use crate::resilience::RetryPolicy;
use crate::selector::SelectorCatalog;

impl<State> PipelineConfigBuilder<State> {
    #[must_use]
    pub fn business_context(mut self, context: impl Into<String>) -> Self {
        self.draft.business_context = context.into();
        self
    }

    #[must_use]
    pub fn business_goal(mut self, name: impl Into<String>, goal: impl Into<String>) -> Self {
        self.draft.business_goals.insert(name.into(), goal.into());
        self
    }

    #[must_use]
    pub fn business_goals(mut self, goals: BTreeMap<String, String>) -> Self {
        self.draft.business_goals = goals;
        self
    }

    #[must_use]
    pub fn list_url(mut self, url: impl Into<String>) -> Self {
        self.draft.list_url = url.into();
        self
    }

    #[must_use]
    pub fn site_base_url(mut self, url: impl Into<String>) -> Self {
        self.draft.site_base_url = url.into();
        self
    }

    /// Regex every discovered url must match. Compiled in `build()`.
    #[must_use]
    pub fn target_domain_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.draft.target_domain_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn keywords(mut self, rules: KeywordRules) -> Self {
        self.draft.keywords = rules;
        self
    }

    #[must_use]
    pub fn relevant_only(mut self, relevant_only: bool) -> Self {
        self.draft.relevant_only = relevant_only;
        self
    }

    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.draft.max_pages = pages;
        self
    }

    #[must_use]
    pub fn record_cap(mut self, cap: usize) -> Self {
        self.draft.record_cap = cap;
        self
    }

    #[must_use]
    pub fn max_consecutive_item_failures(mut self, failures: usize) -> Self {
        self.draft.max_consecutive_item_failures = failures;
        self
    }

    #[must_use]
    pub fn selectors(mut self, catalog: SelectorCatalog) -> Self {
        self.draft.selectors = catalog;
        self
    }

    /// Sweeps over a selector's candidates and the backoff between sweeps.
    #[must_use]
    pub fn selector_retry(mut self, policy: RetryPolicy) -> Self {
        self.draft.selector_retry = policy;
        self
    }

    /// How long each candidate locator is polled before the next one is tried.
    #[must_use]
    pub fn selector_wait(mut self, wait: Duration) -> Self {
        self.draft.selector_wait = wait;
        self
    }

    #[must_use]
    pub fn page_load_timeout(mut self, timeout: Duration) -> Self {
        self.draft.page_load_timeout = timeout;
        self
    }

    /// Headed mode is useful for the first run, when the site login has to
    /// be completed by hand into the persistent profile.
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.draft.headless = headless;
        self
    }

    #[must_use]
    pub fn browser_profile_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.draft.browser_profile_dir = dir.map(Into::into);
        self
    }

    #[must_use]
    pub fn detail_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.draft.detail_api_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn detail_api_key(mut self, key: Option<String>) -> Self {
        self.draft.detail_api_key = key;
        self
    }

    #[must_use]
    pub fn fetch_comments(mut self, fetch: bool) -> Self {
        self.draft.fetch_comments = fetch;
        self
    }

    #[must_use]
    pub fn fetch_concurrency(mut self, limit: usize) -> Self {
        self.draft.fetch_concurrency = limit;
        self
    }

    #[must_use]
    pub fn fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.draft.fetch_retry = policy;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.draft.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_comments(mut self, max: usize) -> Self {
        self.draft.max_comments = max;
        self
    }

    /// Polling cadence and overall wait for crawl tasks created on a cache miss.
    #[must_use]
    pub fn task_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.draft.task_poll_interval = interval;
        self.draft.task_max_wait = max_wait;
        self
    }

    /// Check the detail API before fetching. When the check fails every
    /// record is emitted synthetic without issuing detail requests.
    #[must_use]
    pub fn health_check(mut self, enabled: bool) -> Self {
        self.draft.health_check = enabled;
        self
    }

    #[must_use]
    pub fn analysis_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.draft.analysis_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn strategy_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.draft.strategy_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn analysis_limit(mut self, limit: usize) -> Self {
        self.draft.analysis_limit = limit;
        self
    }

    #[must_use]
    pub fn analyze_synthetic(mut self, analyze: bool) -> Self {
        self.draft.analyze_synthetic = analyze;
        self
    }

    #[must_use]
    pub fn stage_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.draft.stage_timeouts = timeouts;
        self
    }

    /// Overlay settings from the process environment.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `MEDIACRAWLER_API_ENDPOINT` | detail API endpoint |
    /// | `MEDIACRAWLER_API_KEY` | detail API bearer token |
    /// | `NOTESCOUT_LIST_URL` | list page |
    /// | `NOTESCOUT_MAX_PAGES` | page bound |
    /// | `NOTESCOUT_RECORD_CAP` | record cap |
    /// | `NOTESCOUT_FETCH_CONCURRENCY` | parallel detail requests |
    /// | `NOTESCOUT_FETCH_COMMENTS` | `true`/`false` |
    /// | `NOTESCOUT_MAX_COMMENTS` | comment cap for crawl tasks |
    /// | `NOTESCOUT_HEADLESS` | `true`/`false` |
    /// | `NOTESCOUT_PROFILE_DIR` | persistent browser profile |
    /// | `NOTESCOUT_ANALYSIS_ENDPOINT` | analysis collaborator url |
    /// | `NOTESCOUT_STRATEGY_ENDPOINT` | strategy collaborator url |
    /// | `NOTESCOUT_SELECTORS` | path to a `SelectorCatalog` JSON file |
    /// | `NOTESCOUT_KEYWORDS` | path to a `KeywordRules` JSON file |
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// `apply_env` with an explicit lookup, so callers can layer any source.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MEDIACRAWLER_API_ENDPOINT") {
            self.draft.detail_api_endpoint = v;
        }
        if let Some(v) = get("MEDIACRAWLER_API_KEY") {
            self.draft.detail_api_key = Some(v);
        }
        if let Some(v) = get("NOTESCOUT_LIST_URL") {
            self.draft.list_url = v;
        }
        if let Some(v) = get("NOTESCOUT_MAX_PAGES") {
            self.draft.max_pages = parse_var("NOTESCOUT_MAX_PAGES", &v)?;
        }
        if let Some(v) = get("NOTESCOUT_RECORD_CAP") {
            self.draft.record_cap = parse_var("NOTESCOUT_RECORD_CAP", &v)?;
        }
        if let Some(v) = get("NOTESCOUT_FETCH_CONCURRENCY") {
            self.draft.fetch_concurrency = parse_var("NOTESCOUT_FETCH_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("NOTESCOUT_FETCH_COMMENTS") {
            self.draft.fetch_comments = parse_var("NOTESCOUT_FETCH_COMMENTS", &v)?;
        }
        if let Some(v) = get("NOTESCOUT_MAX_COMMENTS") {
            self.draft.max_comments = parse_var("NOTESCOUT_MAX_COMMENTS", &v)?;
        }
        if let Some(v) = get("NOTESCOUT_HEADLESS") {
            self.draft.headless = parse_var("NOTESCOUT_HEADLESS", &v)?;
        }
        if let Some(v) = get("NOTESCOUT_PROFILE_DIR") {
            self.draft.browser_profile_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("NOTESCOUT_ANALYSIS_ENDPOINT") {
            self.draft.analysis_endpoint = Some(v);
        }
        if let Some(v) = get("NOTESCOUT_STRATEGY_ENDPOINT") {
            self.draft.strategy_endpoint = Some(v);
        }
        if let Some(v) = get("NOTESCOUT_SELECTORS") {
            self.draft.selectors = load_json(Path::new(&v))?;
        }
        if let Some(v) = get("NOTESCOUT_KEYWORDS") {
            self.draft.keywords = load_json(Path::new(&v))?;
        }
        Ok(self)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PipelineError::Config(format!("{key}='{value}': {e}")))
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| PipelineError::Config(format!("invalid JSON in {}: {e}", path.display())))
}
