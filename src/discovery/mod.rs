//! Discovery: paginate the list view, extract and validate records, and
//! aggregate them into one deduplicated set.

pub mod aggregator;
pub mod extractor;
pub mod pagination;
pub mod runner;

pub use aggregator::{DiscoveryAggregator, PageMerge};
pub use extractor::{
    MetricParseError, PageExtraction, PageExtractor, RawListing, RecordValidator, Relevance,
    classify, parse_metric,
};
pub use pagination::{Advance, CursorState, PaginationController, PaginationCursor, StopReason};
pub use runner::{ChromiumDiscoverer, Discoverer, DiscoveryOutcome, SessionDiscoverer, run_discovery};
