//! Analysis and strategy collaborators
//!
//! Both are opaque services: the pipeline hands them records plus business
//! context and only checks the shape of what comes back.

pub mod analysis;
pub mod http;
pub mod strategy;
pub mod summary;

pub use analysis::{AnalysisResult, Analyzer, BusinessContext};
pub use http::{HttpAnalyzer, HttpStrategist};
pub use strategy::{StrategyDocument, StrategyInput, Strategist};
pub use summary::{AnalysisSummary, SuccessFormula};
