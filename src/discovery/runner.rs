//! Discovery stage: pagination, extraction and aggregation over one session.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::aggregator::DiscoveryAggregator;
use super::extractor::{PageExtractor, RecordValidator};
use super::pagination::{Advance, CursorState, PaginationController};
use crate::browser::{BrowserSession, ChromiumSession, LaunchOptions};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::records::DiscoveredRecord;
use crate::selector::{ResolverSettings, SelectorResolver};
use crate::utils::constants::SELECTOR_POLL_INTERVAL_MS;

#[derive(Debug)]
pub struct DiscoveryOutcome {
    pub records: Vec<DiscoveredRecord>,
    pub pages_loaded: usize,
    pub final_cursor: CursorState,
    /// Url duplicates plus modal cards skipped for an already-read title.
    pub duplicates: usize,
    pub irrelevant_dropped: usize,
    /// Per-record and per-page failures, in the order they happened.
    pub errors: Vec<PipelineError>,
    /// The stage deadline cut discovery short.
    pub timed_out: bool,
}

/// Produces the discovery stage's record set.
#[async_trait]
pub trait Discoverer: Send + Sync {
    async fn discover(&self, config: &PipelineConfig, deadline: Instant) -> Result<DiscoveryOutcome>;
}

/// Run discovery over an already-open session.
///
/// Never fails on its own account: page and record failures are collected
/// into the outcome and the records gathered so far are returned.
pub async fn run_discovery(
    session: &dyn BrowserSession,
    config: &PipelineConfig,
    deadline: Instant,
) -> DiscoveryOutcome {
    let settings = ResolverSettings {
        retry: config.selector_retry(),
        candidate_wait: config.selector_wait(),
        poll_interval: Duration::from_millis(SELECTOR_POLL_INTERVAL_MS),
    };
    let resolver = SelectorResolver::new(session, config.selectors(), settings);
    let mut controller = PaginationController::new(
        session,
        &resolver,
        config.list_url(),
        config.page_load_timeout(),
        config.max_pages(),
    );
    let mut extractor = PageExtractor::new(
        session,
        &resolver,
        RecordValidator::from_config(config),
        config.max_consecutive_item_failures(),
    )
    .relevant_only(config.relevant_only());
    let mut aggregator = DiscoveryAggregator::new(config.record_cap(), config.max_pages());

    let mut errors = Vec::new();
    let mut irrelevant_dropped = 0;
    let mut repeated_titles = 0;
    let mut timed_out = false;

    loop {
        if aggregator.is_full() {
            info!(
                "Aggregator full ({} records, {} pages)",
                aggregator.records().len(),
                aggregator.pages()
            );
            break;
        }
        if Instant::now() >= deadline {
            warn!("Discovery deadline reached after {} page(s)", aggregator.pages());
            timed_out = true;
            break;
        }

        let page = match controller.advance().await {
            Advance::Loaded { page } => page,
            Advance::Stopped(state) => {
                debug!("Pagination stopped: {state:?}");
                break;
            }
        };

        match extractor.extract_page(page).await {
            Ok(extraction) => {
                errors.extend(extraction.failures);
                irrelevant_dropped += extraction.irrelevant_skipped;
                repeated_titles += extraction.repeats_skipped;
                let merge = aggregator.accept_page(extraction.records);
                info!(
                    "Page {page}: {} item(s), {} new, {} duplicate(s), {} irrelevant",
                    extraction.items_seen,
                    merge.accepted,
                    merge.duplicates + extraction.repeats_skipped,
                    extraction.irrelevant_skipped
                );
            }
            Err(e) => {
                warn!("Page {page}: extraction failed: {e}");
                errors.push(e);
            }
        }

        if controller.cursor().state.is_terminal() {
            break;
        }
    }

    if let Some(e) = controller.take_error() {
        errors.push(e);
    }
    if timed_out {
        errors.push(PipelineError::StageTimeout {
            stage: "discovery".to_string(),
            timeout: config.stage_timeouts().discovery,
        });
    }

    let pages_loaded = controller.cursor().page_index;
    let final_cursor = controller.cursor().state;
    let duplicates = aggregator.duplicates() + repeated_titles;
    DiscoveryOutcome {
        records: aggregator.into_records(),
        pages_loaded,
        final_cursor,
        duplicates,
        irrelevant_dropped,
        errors,
        timed_out,
    }
}

/// Discovers over a caller-supplied session, one run at a time.
pub struct SessionDiscoverer<S> {
    session: Mutex<S>,
}

impl<S: BrowserSession> SessionDiscoverer<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    pub fn into_inner(self) -> S {
        self.session.into_inner()
    }
}

#[async_trait]
impl<S: BrowserSession> Discoverer for SessionDiscoverer<S> {
    async fn discover(&self, config: &PipelineConfig, deadline: Instant) -> Result<DiscoveryOutcome> {
        let session = self.session.lock().await;
        Ok(run_discovery(&*session, config, deadline).await)
    }
}

/// Launches a Chromium session for the run and closes it afterwards.
#[derive(Debug, Default)]
pub struct ChromiumDiscoverer;

#[async_trait]
impl Discoverer for ChromiumDiscoverer {
    async fn discover(&self, config: &PipelineConfig, deadline: Instant) -> Result<DiscoveryOutcome> {
        let options = LaunchOptions {
            headless: config.headless(),
            profile_dir: config.browser_profile_dir().map(|p| p.to_path_buf()),
            op_timeout: config.page_load_timeout(),
        };
        let session = ChromiumSession::launch(&options).await?;
        let outcome = run_discovery(&session, config, deadline).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {e:#}");
        }
        Ok(outcome)
    }
}
