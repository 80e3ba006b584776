//! Persisted pipeline state
//!
//! `PipelineState` is the run's single aggregate and the snapshot consumers
//! read. Only the orchestrator mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::collaborators::{AnalysisResult, AnalysisSummary, StrategyDocument};
use crate::error::{ErrorKind, PipelineError, Result};
use crate::records::{DetailedRecord, DiscoveredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    Fetch,
    Analyze,
    Strategize,
    Done,
    Failed,
}

impl Stage {
    /// The four stages that do work, in execution order.
    pub const WORK: [Stage; 4] = [Stage::Discovery, Stage::Fetch, Stage::Analyze, Stage::Strategize];

    /// Successor after a usable finish. `None` for terminal stages.
    #[must_use]
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Discovery => Some(Stage::Fetch),
            Stage::Fetch => Some(Stage::Analyze),
            Stage::Analyze => Some(Stage::Strategize),
            Stage::Strategize => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Fetch => "fetch",
            Stage::Analyze => "analyze",
            Stage::Strategize => "strategize",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl StageStatus {
    /// Whether the next stage may start.
    #[must_use]
    pub fn is_usable(self) -> bool {
        !matches!(self, StageStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input_count: usize,
    pub output_count: usize,
    pub error_count: usize,
    pub timed_out: bool,
    /// Stage-specific tallies (pages loaded, duplicates, synthetic, ...).
    #[serde(default)]
    pub counts: BTreeMap<String, usize>,
}

impl StageReport {
    #[must_use]
    pub fn new(stage: Stage, status: StageStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            stage,
            status,
            started_at,
            finished_at: Utc::now(),
            input_count: 0,
            output_count: 0,
            error_count: 0,
            timed_out: false,
            counts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_io(mut self, input_count: usize, output_count: usize) -> Self {
        self.input_count = input_count;
        self.output_count = output_count;
        self
    }

    #[must_use]
    pub fn with_count(mut self, name: &str, value: usize) -> Self {
        self.counts.insert(name.to_string(), value);
        self
    }
}

/// One entry in the ordered error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub stage: Stage,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: Uuid,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Next stage to run, or `Done` / `Failed`.
    pub stage: Stage,
    /// The work stage that failed when `stage` is `Failed`.
    #[serde(default)]
    pub failed_at: Option<Stage>,
    #[serde(default)]
    pub reports: BTreeMap<Stage, StageReport>,
    #[serde(default)]
    pub discovered: Vec<DiscoveredRecord>,
    #[serde(default)]
    pub detailed: Vec<DetailedRecord>,
    #[serde(default)]
    pub analyses: Vec<AnalysisResult>,
    #[serde(default)]
    pub summary: Option<AnalysisSummary>,
    #[serde(default)]
    pub strategy: Option<StrategyDocument>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

impl PipelineState {
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.into(),
            created_at: now,
            updated_at: now,
            stage: Stage::Discovery,
            failed_at: None,
            reports: BTreeMap::new(),
            discovered: Vec::new(),
            detailed: Vec::new(),
            analyses: Vec::new(),
            summary: None,
            strategy: None,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn status_of(&self, stage: Stage) -> Option<StageStatus> {
        self.reports.get(&stage).map(|r| r.status)
    }

    /// Finished with at least `PartialSuccess`.
    #[must_use]
    pub fn is_completed(&self, stage: Stage) -> bool {
        self.status_of(stage).is_some_and(StageStatus::is_usable)
    }

    /// Overall outcome once the run is terminal; `None` while stages remain.
    #[must_use]
    pub fn overall_status(&self) -> Option<StageStatus> {
        match self.stage {
            Stage::Failed => Some(StageStatus::Failed),
            Stage::Done => {
                let partial = self
                    .reports
                    .values()
                    .any(|r| r.status != StageStatus::Success);
                Some(if partial {
                    StageStatus::PartialSuccess
                } else {
                    StageStatus::Success
                })
            }
            _ => None,
        }
    }

    /// Append to the error log. `record` overrides the identity carried by
    /// the error itself.
    pub fn log_error(&mut self, stage: Stage, err: &PipelineError, record: Option<&str>) {
        self.errors.push(ErrorEntry {
            stage,
            kind: err.kind(),
            record: record.or_else(|| err.record()).map(str::to_string),
            message: err.to_string(),
            at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn errors_for(&self, stage: Stage) -> Vec<&ErrorEntry> {
        self.errors.iter().filter(|e| e.stage == stage).collect()
    }

    /// Fold a finished stage's report in and move to the successor, or to
    /// `Failed` when the report is not usable.
    pub fn complete(&mut self, report: StageReport) {
        let stage = report.stage;
        if report.status.is_usable() {
            self.stage = stage.next().unwrap_or(Stage::Done);
            self.failed_at = None;
        } else {
            self.stage = Stage::Failed;
            self.failed_at = Some(stage);
        }
        self.reports.insert(stage, report);
        self.updated_at = Utc::now();
    }

    /// Stage to run next. A failed run re-enters the stage that failed;
    /// `Done` yields `None`.
    pub fn reopen(&mut self) -> Option<Stage> {
        match self.stage {
            Stage::Done => None,
            Stage::Failed => {
                let stage = self.failed_at.take().unwrap_or(Stage::Discovery);
                self.stage = stage;
                Some(stage)
            }
            stage => Some(stage),
        }
    }

    /// Structural checks applied to a loaded snapshot before resuming.
    pub fn validate(&self) -> Result<()> {
        let current = match self.stage {
            Stage::Failed => self.failed_at.unwrap_or(Stage::Discovery),
            stage => stage,
        };
        for stage in Stage::WORK.into_iter().take_while(|s| *s < current) {
            if !self.is_completed(stage) {
                return Err(PipelineError::InvariantViolation(format!(
                    "stage {current} recorded before {stage} completed"
                )));
            }
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.discovered.iter().find(|r| !seen.insert(r.url.as_str())) {
            return Err(PipelineError::InvariantViolation(format!(
                "duplicate discovered url {}",
                dup.url
            )));
        }
        if let Some(orphan) = self.detailed.iter().find(|d| !seen.contains(d.url())) {
            return Err(PipelineError::InvariantViolation(format!(
                "detailed record {} has no discovered source",
                orphan.url()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Metrics;

    fn report(stage: Stage, status: StageStatus) -> StageReport {
        StageReport::new(stage, status, Utc::now())
    }

    fn discovered(url: &str) -> DiscoveredRecord {
        DiscoveredRecord {
            title: url.to_string(),
            url: url.to_string(),
            note_id: None,
            metrics: Metrics::default(),
            relevant: true,
            relevance_score: 1.0,
            page: 1,
        }
    }

    #[test]
    fn usable_reports_advance_stage() {
        let mut state = PipelineState::new("露营");
        state.complete(report(Stage::Discovery, StageStatus::Success));
        assert_eq!(state.stage, Stage::Fetch);
        state.complete(report(Stage::Fetch, StageStatus::PartialSuccess));
        assert_eq!(state.stage, Stage::Analyze);
        state.complete(report(Stage::Analyze, StageStatus::Success));
        state.complete(report(Stage::Strategize, StageStatus::Success));
        assert_eq!(state.stage, Stage::Done);
        assert_eq!(state.overall_status(), Some(StageStatus::PartialSuccess));
    }

    #[test]
    fn failed_report_stops_and_reopens_same_stage() {
        let mut state = PipelineState::new("露营");
        state.complete(report(Stage::Discovery, StageStatus::Success));
        state.complete(report(Stage::Fetch, StageStatus::Failed));
        assert_eq!(state.stage, Stage::Failed);
        assert_eq!(state.failed_at, Some(Stage::Fetch));
        assert_eq!(state.overall_status(), Some(StageStatus::Failed));

        assert_eq!(state.reopen(), Some(Stage::Fetch));
        assert_eq!(state.stage, Stage::Fetch);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn done_does_not_reopen() {
        let mut state = PipelineState::new("露营");
        state.stage = Stage::Done;
        assert_eq!(state.reopen(), None);
    }

    #[test]
    fn validate_rejects_skipped_stage() {
        let mut state = PipelineState::new("露营");
        state.stage = Stage::Analyze;
        state.complete(report(Stage::Discovery, StageStatus::Success));
        state.stage = Stage::Analyze;
        let err = state.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn validate_rejects_duplicate_and_orphan_urls() {
        let mut state = PipelineState::new("露营");
        state.discovered = vec![discovered("https://a"), discovered("https://a")];
        assert!(state.validate().is_err());

        state.discovered = vec![discovered("https://a")];
        state.detailed = vec![DetailedRecord::synthetic(discovered("https://b"), "x")];
        assert!(state.validate().is_err());
    }

    #[test]
    fn error_log_keeps_record_identity() {
        let mut state = PipelineState::new("露营");
        let err = PipelineError::FetchFailure {
            url: "https://a".into(),
            reason: "HTTP 500".into(),
        };
        state.log_error(Stage::Fetch, &err, None);
        state.log_error(Stage::Analyze, &PipelineError::collaborator("analysis", "bad"), Some("https://b"));
        assert_eq!(state.errors[0].record.as_deref(), Some("https://a"));
        assert_eq!(state.errors[1].record.as_deref(), Some("https://b"));
        assert_eq!(state.errors_for(Stage::Fetch).len(), 1);
    }
}
