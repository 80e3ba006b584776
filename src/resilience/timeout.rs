//! Timeout wrapper for browser operations
//!
//! Every suspension point in discovery (navigation, clicks, DOM queries) is
//! bounded; an unresponsive page context must never block the pipeline.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Run `operation` under `tokio::time::timeout`, naming it in the error.
///
/// # Returns
/// * `Ok(T)` - Operation completed in time
/// * `Err` - The operation failed, or `timeout` elapsed first
pub async fn with_timeout<F, T>(operation: F, timeout: Duration, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "{operation_name} timeout after {}ms",
            timeout.as_millis()
        )),
    }
}
