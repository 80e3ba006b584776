//! One retry policy applied uniformly across the pipeline
//!
//! Selector resolution retries whole sweeps over its candidate list; the
//! detail fetcher retries individual urls. Both go through `RetryPolicy` so
//! attempt counting and backoff timing are identical everywhere.

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

/// `{max_attempts, backoff_base_ms}` plus optional jitter and a backoff ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub jitter_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// Final error after the attempt budget ran out (or a non-retryable error hit).
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_base_ms,
            jitter_ms: 0,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }

    /// A single attempt, no waiting.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, 0)
    }

    #[must_use]
    pub const fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Deterministic part of the delay after `failed_attempt` (1-based) failed:
    /// `backoff_base_ms * 2^(failed_attempt - 1)`, capped at `max_backoff_ms`.
    #[must_use]
    pub fn base_delay(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(20);
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Delay to sleep after `failed_attempt` failed, jitter included.
    #[must_use]
    pub fn delay_for_attempt(&self, failed_attempt: u32) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rand::rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };
        self.base_delay(failed_attempt) + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, the budget is spent, or `should_retry`
    /// rejects an error. `op` receives the 1-based attempt number.
    pub async fn retry<T, E, F, Fut, P>(
        &self,
        label: &str,
        mut op: F,
        should_retry: P,
    ) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max = self.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{label}: succeeded on attempt {attempt}/{max}");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if !should_retry(&e) {
                        warn!("{label}: non-retryable error on attempt {attempt}/{max}: {e}");
                        return Err(Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    if attempt >= max {
                        warn!("{label}: giving up after {attempt} attempt(s): {e}");
                        return Err(Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        "{label}: attempt {attempt}/{max} failed, retrying in {}ms: {e}",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1_000).with_jitter(250)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 100).with_max_backoff(350);
        assert_eq!(policy.base_delay(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay(2), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(350));
        assert_eq!(policy.base_delay(30), Duration::from_millis(350));
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::new(0, 10).attempts(), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4, 1);
        let out: Result<u32, Exhausted<String>> = policy
            .retry(
                "flaky",
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err(format!("fail {attempt}"))
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(out.ok(), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, 1);
        let out: Result<(), Exhausted<&str>> = policy
            .retry(
                "terminal",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("bad request") }
                },
                |_| false,
            )
            .await;
        let err = out.err().map(|e| e.attempts);
        assert_eq!(err, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_budget() {
        let policy = RetryPolicy::new(3, 1);
        let out: Result<(), Exhausted<&str>> = policy
            .retry("always", |_| async { Err("down") }, |_| true)
            .await;
        match out {
            Err(e) => {
                assert_eq!(e.attempts, 3);
                assert_eq!(e.last_error, "down");
            }
            Ok(()) => panic!("expected exhaustion"),
        }
    }
}
