pub mod browser;
pub mod collaborators;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod records;
pub mod resilience;
pub mod selector;
pub mod utils;

pub use browser::{BrowserSession, ChromiumSession, ElementHandle, LaunchOptions};
pub use collaborators::{
    AnalysisResult, AnalysisSummary, Analyzer, BusinessContext, HttpAnalyzer, HttpStrategist,
    StrategyDocument, Strategist,
};
pub use config::{KeywordRules, PipelineConfig, Precedence, StageTimeouts};
pub use discovery::{ChromiumDiscoverer, Discoverer, DiscoveryOutcome, SessionDiscoverer};
pub use error::{ErrorKind, PipelineError, Result};
pub use fetch::{DetailApi, DetailFetcher, FetchError, HttpDetailClient};
pub use pipeline::{
    JsonStateStore, LogProgress, NoOpProgress, PipelineOrchestrator, PipelineState,
    ProgressReporter, Stage, StageStatus, StateStore,
};
pub use records::{AuthorInfo, ContentOrigin, DetailedRecord, DiscoveredRecord, Metric, Metrics};
pub use resilience::RetryPolicy;
pub use selector::{ElementKey, Locator, LocatorKind, SelectorCatalog, SelectorSpec};
