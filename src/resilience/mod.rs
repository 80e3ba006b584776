//! Retry and timeout primitives shared by selector resolution and detail fetching.

pub mod retry;
pub mod timeout;

pub use retry::{Exhausted, RetryPolicy};
pub use timeout::with_timeout;
