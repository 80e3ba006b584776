//! Progress reporting for pipeline runs

use log::{info, warn};

use super::state::{PipelineState, Stage, StageStatus};

/// Lifecycle callbacks fired by the orchestrator.
pub trait ProgressReporter: Send + Sync {
    fn report_stage_started(&self, stage: Stage);

    fn report_stage_finished(&self, stage: Stage, status: StageStatus);

    /// The snapshot was written after `stage`.
    fn report_state_persisted(&self, stage: Stage);

    fn report_error(&self, stage: Stage, error: &str);

    fn report_completed(&self, state: &PipelineState);
}

/// Progress reporter that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report_stage_started(&self, _stage: Stage) {}

    #[inline(always)]
    fn report_stage_finished(&self, _stage: Stage, _status: StageStatus) {}

    #[inline(always)]
    fn report_state_persisted(&self, _stage: Stage) {}

    #[inline(always)]
    fn report_error(&self, _stage: Stage, _error: &str) {}

    #[inline(always)]
    fn report_completed(&self, _state: &PipelineState) {}
}

/// Writes each event to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report_stage_started(&self, stage: Stage) {
        info!("Stage {stage} started");
    }

    fn report_stage_finished(&self, stage: Stage, status: StageStatus) {
        info!("Stage {stage} finished: {status:?}");
    }

    fn report_state_persisted(&self, stage: Stage) {
        info!("State persisted after {stage}");
    }

    fn report_error(&self, stage: Stage, error: &str) {
        warn!("[{stage}] {error}");
    }

    fn report_completed(&self, state: &PipelineState) {
        info!(
            "Run {} finished at {} ({} discovered, {} detailed, {} analysed, {} error(s))",
            state.run_id,
            state.stage,
            state.discovered.len(),
            state.detailed.len(),
            state.analyses.len(),
            state.errors.len()
        );
    }
}
