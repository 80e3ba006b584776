//! Selector resolution: ranked locator chains and the engine that walks them.

pub mod resolver;
pub mod spec;

pub use resolver::{Resolved, ResolverSettings, SelectorResolver};
pub use spec::{ElementKey, Locator, LocatorKind, SelectorCatalog, SelectorSpec};
