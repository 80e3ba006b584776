//! Stage sequencing
//!
//! Runs `Discovery -> Fetch -> Analyze -> Strategize -> Done`, folding each
//! stage's output into `PipelineState` and persisting the snapshot after every
//! stage. A stage starts only when its predecessor finished with at least
//! `PartialSuccess`; zero usable records entering a stage fails the run.

use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::progress::{NoOpProgress, ProgressReporter};
use super::state::{PipelineState, Stage, StageReport, StageStatus};
use super::store::StateStore;
use crate::collaborators::{
    AnalysisResult, AnalysisSummary, Analyzer, BusinessContext, StrategyDocument, StrategyInput,
    Strategist,
};
use crate::config::PipelineConfig;
use crate::discovery::{CursorState, Discoverer};
use crate::error::{PipelineError, Result};
use crate::fetch::{DetailApi, DetailFetcher, FetchSettings};
use crate::resilience::with_timeout;

/// Extra time a discoverer gets past its cooperative deadline before it is
/// cancelled outright.
const DISCOVERY_HARD_STOP_GRACE: Duration = Duration::from_secs(30);

pub struct PipelineOrchestrator<P: ProgressReporter = NoOpProgress> {
    config: PipelineConfig,
    context: BusinessContext,
    discoverer: Arc<dyn Discoverer>,
    detail_api: Arc<dyn DetailApi>,
    analyzer: Arc<dyn Analyzer>,
    strategist: Arc<dyn Strategist>,
    store: Arc<dyn StateStore>,
    progress: P,
}

pub struct PipelineBuilder<P: ProgressReporter = NoOpProgress> {
    config: PipelineConfig,
    discoverer: Option<Arc<dyn Discoverer>>,
    detail_api: Option<Arc<dyn DetailApi>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    strategist: Option<Arc<dyn Strategist>>,
    store: Option<Arc<dyn StateStore>>,
    progress: P,
}

impl PipelineOrchestrator {
    #[must_use]
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            discoverer: None,
            detail_api: None,
            analyzer: None,
            strategist: None,
            store: None,
            progress: NoOpProgress,
        }
    }
}

impl<P: ProgressReporter> PipelineBuilder<P> {
    #[must_use]
    pub fn discoverer(mut self, discoverer: Arc<dyn Discoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    #[must_use]
    pub fn detail_api(mut self, api: Arc<dyn DetailApi>) -> Self {
        self.detail_api = Some(api);
        self
    }

    #[must_use]
    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    #[must_use]
    pub fn strategist(mut self, strategist: Arc<dyn Strategist>) -> Self {
        self.strategist = Some(strategist);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn progress<Q: ProgressReporter>(self, progress: Q) -> PipelineBuilder<Q> {
        PipelineBuilder {
            config: self.config,
            discoverer: self.discoverer,
            detail_api: self.detail_api,
            analyzer: self.analyzer,
            strategist: self.strategist,
            store: self.store,
            progress,
        }
    }

    pub fn build(self) -> Result<PipelineOrchestrator<P>> {
        fn missing(part: &str) -> PipelineError {
            PipelineError::Config(format!("pipeline built without a {part}"))
        }

        Ok(PipelineOrchestrator {
            context: BusinessContext::from_config(&self.config),
            discoverer: self.discoverer.ok_or_else(|| missing("discoverer"))?,
            detail_api: self.detail_api.ok_or_else(|| missing("detail API client"))?,
            analyzer: self.analyzer.ok_or_else(|| missing("analyzer"))?,
            strategist: self.strategist.ok_or_else(|| missing("strategist"))?,
            store: self.store.ok_or_else(|| missing("state store"))?,
            config: self.config,
            progress: self.progress,
        })
    }
}

impl<P: ProgressReporter> PipelineOrchestrator<P> {
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Discard any snapshot and run every stage from Discovery.
    pub async fn run_fresh(&self) -> PipelineState {
        if let Err(e) = self.store.reset().await {
            warn!("Could not clear previous snapshot: {e}");
        }
        info!("Starting fresh run for topic '{}'", self.config.topic());
        self.run(PipelineState::new(self.config.topic())).await
    }

    /// Continue from the persisted snapshot, or start fresh when none exists.
    /// Completed stages are never re-run.
    pub async fn resume(&self) -> Result<PipelineState> {
        let Some(state) = self.store.load().await? else {
            return Ok(self.run_fresh().await);
        };
        if state.topic != self.config.topic() {
            return Err(PipelineError::Config(format!(
                "snapshot topic '{}' differs from configured topic '{}'",
                state.topic,
                self.config.topic()
            )));
        }
        state.validate()?;
        info!("Resuming run {} at stage {}", state.run_id, state.stage);
        Ok(self.run(state).await)
    }

    /// Drive `state` to `Done` or `Failed`.
    pub async fn run(&self, mut state: PipelineState) -> PipelineState {
        let Some(mut stage) = state.reopen() else {
            info!("Run {} already done", state.run_id);
            self.progress.report_completed(&state);
            return state;
        };

        loop {
            self.progress.report_stage_started(stage);
            let errors_before = state.errors.len();
            let started_at = Utc::now();

            let mut report = match stage {
                Stage::Discovery => self.discovery_stage(&mut state, started_at).await,
                Stage::Fetch => self.fetch_stage(&mut state, started_at).await,
                Stage::Analyze => self.analyze_stage(&mut state, started_at).await,
                Stage::Strategize => self.strategize_stage(&mut state, started_at).await,
                Stage::Done | Stage::Failed => break,
            };
            report.error_count = state.errors.len() - errors_before;
            report.finished_at = Utc::now();

            for entry in &state.errors[errors_before..] {
                self.progress.report_error(stage, &entry.message);
            }
            let status = report.status;
            state.complete(report);
            self.progress.report_stage_finished(stage, status);
            self.persist(&mut state, stage).await;

            match state.stage {
                Stage::Done | Stage::Failed => break,
                next => stage = next,
            }
        }

        if state.stage == Stage::Failed {
            error!(
                "Run {} failed at stage {}",
                state.run_id,
                state.failed_at.map_or("unknown", Stage::as_str)
            );
        }
        self.progress.report_completed(&state);
        state
    }

    /// A failed write is logged into the state and the run continues.
    async fn persist(&self, state: &mut PipelineState, stage: Stage) {
        match self.store.save(state).await {
            Ok(()) => self.progress.report_state_persisted(stage),
            Err(e) => {
                error!("Failed to persist state after {stage}: {e}");
                self.progress.report_error(stage, &e.to_string());
                state.log_error(stage, &e, None);
            }
        }
    }

    fn fail_empty(
        state: &mut PipelineState,
        stage: Stage,
        started_at: chrono::DateTime<Utc>,
    ) -> StageReport {
        let err = PipelineError::NoRecordsFound {
            stage: stage.to_string(),
        };
        warn!("{err}");
        state.log_error(stage, &err, None);
        StageReport::new(stage, StageStatus::Failed, started_at)
    }

    async fn discovery_stage(
        &self,
        state: &mut PipelineState,
        started_at: chrono::DateTime<Utc>,
    ) -> StageReport {
        let budget = self.config.stage_timeouts().discovery;
        let deadline = Instant::now() + budget;
        let discovery = async {
            self.discoverer
                .discover(&self.config, deadline)
                .await
                .map_err(anyhow::Error::from)
        };

        let hard_stop = budget + DISCOVERY_HARD_STOP_GRACE;
        let outcome = match with_timeout(discovery, hard_stop, "discovery").await {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = e.downcast::<PipelineError>().unwrap_or(PipelineError::StageTimeout {
                    stage: Stage::Discovery.to_string(),
                    timeout: budget,
                });
                state.log_error(Stage::Discovery, &err, None);
                state.discovered.clear();
                return Self::fail_empty(state, Stage::Discovery, started_at);
            }
        };

        for err in &outcome.errors {
            state.log_error(Stage::Discovery, err, None);
        }
        if outcome.records.is_empty() {
            return Self::fail_empty(state, Stage::Discovery, started_at);
        }

        let degraded = outcome.timed_out
            || !outcome.errors.is_empty()
            || outcome.final_cursor == CursorState::Error;
        let status = if degraded {
            StageStatus::PartialSuccess
        } else {
            StageStatus::Success
        };
        info!(
            "Discovery kept {} record(s) over {} page(s)",
            outcome.records.len(),
            outcome.pages_loaded
        );

        let seen = outcome.records.len() + outcome.duplicates + outcome.irrelevant_dropped;
        let mut report = StageReport::new(Stage::Discovery, status, started_at)
            .with_io(seen, outcome.records.len())
            .with_count("pages_loaded", outcome.pages_loaded)
            .with_count("duplicates", outcome.duplicates)
            .with_count("irrelevant_dropped", outcome.irrelevant_dropped);
        report.timed_out = outcome.timed_out;
        state.discovered = outcome.records;
        report
    }

    async fn fetch_stage(
        &self,
        state: &mut PipelineState,
        started_at: chrono::DateTime<Utc>,
    ) -> StageReport {
        if state.discovered.is_empty() {
            return Self::fail_empty(state, Stage::Fetch, started_at);
        }

        let deadline = Instant::now() + self.config.stage_timeouts().fetch;
        let fetcher = DetailFetcher::new(
            Arc::clone(&self.detail_api),
            FetchSettings::from_config(&self.config),
        );
        let outcome = fetcher.fetch_all(state.discovered.clone(), deadline).await;

        for err in &outcome.failures {
            state.log_error(Stage::Fetch, err, None);
        }
        let status = outcome.status();
        let synthetic = outcome.synthetic_count();
        let mut report = StageReport::new(Stage::Fetch, status, started_at)
            .with_io(state.discovered.len(), outcome.records.len())
            .with_count("synthetic", synthetic);
        report.timed_out = outcome.timed_out;
        state.detailed = outcome.records;

        if status == StageStatus::Failed {
            let err = PipelineError::NoRecordsFound {
                stage: Stage::Fetch.to_string(),
            };
            warn!("Detail API unreachable for every record: {err}");
            state.log_error(Stage::Fetch, &err, None);
        }
        report
    }

    async fn analyze_stage(
        &self,
        state: &mut PipelineState,
        started_at: chrono::DateTime<Utc>,
    ) -> StageReport {
        let analyze_synthetic = self.config.analyze_synthetic();
        let candidates: Vec<_> = state
            .detailed
            .iter()
            .filter(|r| analyze_synthetic || !r.is_synthetic())
            .take(self.config.analysis_limit())
            .cloned()
            .collect();
        let skipped_synthetic = if analyze_synthetic {
            0
        } else {
            state.detailed.iter().filter(|r| r.is_synthetic()).count()
        };
        if candidates.is_empty() {
            return Self::fail_empty(state, Stage::Analyze, started_at);
        }

        let budget = self.config.stage_timeouts().analyze;
        let deadline = Instant::now() + budget;
        let mut results = Vec::with_capacity(candidates.len());
        let mut timed_out = false;

        for record in &candidates {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                timed_out = true;
                state.log_error(
                    Stage::Analyze,
                    &PipelineError::StageTimeout {
                        stage: Stage::Analyze.to_string(),
                        timeout: budget,
                    },
                    None,
                );
                break;
            }

            let call = self.analyzer.analyze(record, &self.context);
            let analyzed = match tokio::time::timeout(remaining, call).await {
                Ok(Ok(payload)) => AnalysisResult::from_payload(record, payload),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(PipelineError::collaborator(
                    "analysis",
                    format!("no response within {remaining:?}"),
                )),
            };
            match analyzed {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!("Skipping analysis of '{}': {e}", record.url());
                    state.log_error(Stage::Analyze, &e, Some(record.url()));
                }
            }
        }

        let status = if results.is_empty() {
            StageStatus::Failed
        } else if results.len() < candidates.len() || timed_out {
            StageStatus::PartialSuccess
        } else {
            StageStatus::Success
        };
        let mut report = StageReport::new(Stage::Analyze, status, started_at)
            .with_io(candidates.len(), results.len())
            .with_count("skipped_synthetic", skipped_synthetic);
        report.timed_out = timed_out;

        let summary = AnalysisSummary::from_results(&results);
        if let Some(avg) = summary.average_score {
            info!("Analysed {} record(s), average score {avg:.1}", results.len());
        }
        state.summary = Some(summary);
        state.analyses = results;
        report
    }

    async fn strategize_stage(
        &self,
        state: &mut PipelineState,
        started_at: chrono::DateTime<Utc>,
    ) -> StageReport {
        if state.analyses.is_empty() {
            return Self::fail_empty(state, Stage::Strategize, started_at);
        }

        let budget = self.config.stage_timeouts().strategize;
        let summary = match state.summary {
            Some(ref summary) => summary.clone(),
            None => AnalysisSummary::from_results(&state.analyses),
        };
        let input = StrategyInput {
            context: &self.context,
            analyses: &state.analyses,
            summary: &summary,
        };

        let outcome = match tokio::time::timeout(budget, self.strategist.strategize(&input)).await {
            Ok(Ok(payload)) => StrategyDocument::from_payload(payload),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PipelineError::StageTimeout {
                stage: Stage::Strategize.to_string(),
                timeout: budget,
            }),
        };
        let analysed = state.analyses.len();

        match outcome {
            Ok(document) => {
                state.strategy = Some(document);
                StageReport::new(Stage::Strategize, StageStatus::Success, started_at)
                    .with_io(analysed, 1)
            }
            Err(e) => {
                error!("Strategy stage failed: {e}");
                state.log_error(Stage::Strategize, &e, None);
                StageReport::new(Stage::Strategize, StageStatus::Failed, started_at)
                    .with_io(analysed, 0)
            }
        }
    }
}
