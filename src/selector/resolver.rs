//! Selector resolution engine
//!
//! Resolves a logical element to a live handle by walking its ranked
//! candidate list. Each candidate is polled for a bounded wait; a sweep is
//! one pass over all candidates; sweeps repeat under the shared
//! `RetryPolicy`. Only after every candidate has been tried for the whole
//! attempt budget does resolution fail with `ElementNotFound`.

use log::debug;
use std::fmt;
use std::time::{Duration, Instant};

use super::spec::{ElementKey, Locator, SelectorCatalog, SelectorSpec};
use crate::browser::{BrowserSession, ElementHandle};
use crate::error::{PipelineError, Result};
use crate::resilience::RetryPolicy;
use crate::utils::constants::{
    DEFAULT_SELECTOR_ATTEMPTS, DEFAULT_SELECTOR_BACKOFF_MS, DEFAULT_SELECTOR_WAIT_MS,
    SELECTOR_POLL_INTERVAL_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Sweeps over the candidate list and the backoff between them.
    pub retry: RetryPolicy,
    /// How long one candidate is polled before the next is tried.
    pub candidate_wait: Duration,
    pub poll_interval: Duration,
}

impl ResolverSettings {
    /// One sweep, one query per candidate, no waiting. For fields inside an
    /// item that has already rendered.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            retry: RetryPolicy::once(),
            candidate_wait: Duration::ZERO,
            poll_interval: Duration::ZERO,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(DEFAULT_SELECTOR_ATTEMPTS, DEFAULT_SELECTOR_BACKOFF_MS),
            candidate_wait: Duration::from_millis(DEFAULT_SELECTOR_WAIT_MS),
            poll_interval: Duration::from_millis(SELECTOR_POLL_INTERVAL_MS),
        }
    }
}

/// A successful resolution and which candidate produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub handle: ElementHandle,
    /// Every element the winning locator matched, in document order.
    pub matches: Vec<ElementHandle>,
    pub candidate_index: usize,
    pub locator: Locator,
    /// 1-based sweep in which the candidate matched.
    pub sweep: u32,
}

#[derive(Debug)]
struct SweepMiss {
    sweep: u32,
}

impl fmt::Display for SweepMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no candidate matched in sweep {}", self.sweep)
    }
}

pub struct SelectorResolver<'a> {
    session: &'a dyn BrowserSession,
    catalog: &'a SelectorCatalog,
    settings: ResolverSettings,
}

impl<'a> SelectorResolver<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        catalog: &'a SelectorCatalog,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            session,
            catalog,
            settings,
        }
    }

    /// Same session and catalog, different timing.
    #[must_use]
    pub fn with_settings(&self, settings: ResolverSettings) -> SelectorResolver<'a> {
        SelectorResolver {
            session: self.session,
            catalog: self.catalog,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub async fn resolve(&self, key: ElementKey) -> Result<Resolved> {
        self.resolve_in(key, None).await
    }

    pub async fn resolve_in(&self, key: ElementKey, scope: Option<ElementHandle>) -> Result<Resolved> {
        self.resolve_spec(key.as_str(), self.catalog.get(key), scope)
            .await
    }

    /// Like `resolve_in`, but an exhausted search is `Ok(None)` instead of an error.
    pub async fn find_in(
        &self,
        key: ElementKey,
        scope: Option<ElementHandle>,
    ) -> Result<Option<Resolved>> {
        match self.resolve_in(key, scope).await {
            Ok(resolved) => Ok(Some(resolved)),
            Err(PipelineError::ElementNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn resolve_spec(
        &self,
        name: &str,
        spec: &SelectorSpec,
        scope: Option<ElementHandle>,
    ) -> Result<Resolved> {
        if spec.is_empty() {
            return Err(PipelineError::ElementNotFound {
                key: name.to_string(),
                candidates: 0,
                attempts: 0,
            });
        }

        let label = format!("resolve {name}");
        let outcome = self
            .settings
            .retry
            .retry(
                &label,
                move |sweep| self.sweep(name, spec, scope, sweep),
                |_| true,
            )
            .await;

        outcome.map_err(|exhausted| PipelineError::ElementNotFound {
            key: name.to_string(),
            candidates: spec.len(),
            attempts: exhausted.attempts,
        })
    }

    async fn sweep(
        &self,
        name: &str,
        spec: &SelectorSpec,
        scope: Option<ElementHandle>,
        sweep: u32,
    ) -> std::result::Result<Resolved, SweepMiss> {
        for (index, locator) in spec.candidates().iter().enumerate() {
            if let Some(matches) = self.poll_candidate(locator, scope).await
                && let Some(&handle) = matches.first()
            {
                debug!(
                    "{name}: candidate #{index} ({locator}) matched {} element(s) in sweep {sweep}",
                    matches.len()
                );
                return Ok(Resolved {
                    handle,
                    matches,
                    candidate_index: index,
                    locator: locator.clone(),
                    sweep,
                });
            }
            debug!("{name}: candidate #{index} ({locator}) missed in sweep {sweep}");
        }
        Err(SweepMiss { sweep })
    }

    /// Poll one locator until it matches or `candidate_wait` elapses.
    async fn poll_candidate(
        &self,
        locator: &Locator,
        scope: Option<ElementHandle>,
    ) -> Option<Vec<ElementHandle>> {
        let start = Instant::now();
        loop {
            match self.session.query(locator, scope).await {
                Ok(found) if !found.is_empty() => return Some(found),
                Ok(_) => {}
                Err(e) => debug!("query {locator} failed: {e:#}"),
            }

            let elapsed = start.elapsed();
            if elapsed >= self.settings.candidate_wait {
                return None;
            }
            let remaining = self.settings.candidate_wait - elapsed;
            tokio::time::sleep(self.settings.poll_interval.min(remaining)).await;
        }
    }
}
