//! Detail fetching: the content API client and the bounded-concurrency
//! stage that drives it.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod payload;

pub use client::{DetailApi, HttpDetailClient};
pub use error::FetchError;
pub use fetcher::{DetailFetcher, FetchOutcome, FetchSettings};
pub use payload::{
    ContentLookup, CrawlTaskRequest, DetailFields, TaskCreated, TaskPhase, TaskStatus, parse_detail,
};
