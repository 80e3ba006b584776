//! Pipeline orchestration: stage state machine, snapshot persistence and
//! progress reporting.

pub mod orchestrator;
pub mod progress;
pub mod state;
pub mod store;

pub use orchestrator::{PipelineBuilder, PipelineOrchestrator};
pub use progress::{LogProgress, NoOpProgress, ProgressReporter};
pub use state::{ErrorEntry, PipelineState, Stage, StageReport, StageStatus};
pub use store::{JsonStateStore, StateStore};
