//! Configuration module for pipeline runs
//!
//! This module provides the `PipelineConfig` struct and its type-safe builder
//! with validation, defaults and an environment overlay.

pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

pub use builder::{Complete, PipelineConfigBuilder, WithTopic};
pub use types::{KeywordRules, PipelineConfig, Precedence, StageTimeouts};
