//! Detail fetch stage
//!
//! Every discovered record produces exactly one `DetailedRecord`, in input
//! order. A record whose fetch fails after its retry budget is replaced by a
//! synthetic placeholder; one record's failure never blocks the others.

use futures::future::join_all;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::client::DetailApi;
use super::error::FetchError;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::state::StageStatus;
use crate::records::{ContentOrigin, DetailedRecord, DiscoveredRecord};
use crate::resilience::RetryPolicy;

#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub fetch_comments: bool,
    pub health_check: bool,
}

impl FetchSettings {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.fetch_concurrency(),
            retry: config.fetch_retry(),
            fetch_comments: config.fetch_comments(),
            health_check: config.health_check(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// One entry per input record, same order.
    pub records: Vec<DetailedRecord>,
    /// One `FetchFailure` per record that fell back to synthetic content.
    pub failures: Vec<PipelineError>,
    /// Every record failed because the API could not be reached.
    pub api_unreachable: bool,
    pub timed_out: bool,
}

impl FetchOutcome {
    #[must_use]
    pub fn synthetic_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_synthetic()).count()
    }

    /// `Failed` only when the API was unreachable for every record.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        if self.api_unreachable {
            StageStatus::Failed
        } else if self.synthetic_count() > 0 {
            StageStatus::PartialSuccess
        } else {
            StageStatus::Success
        }
    }
}

struct Attempted {
    record: DetailedRecord,
    error: Option<(FetchError, u32)>,
}

pub struct DetailFetcher {
    api: Arc<dyn DetailApi>,
    settings: FetchSettings,
}

impl DetailFetcher {
    pub fn new(api: Arc<dyn DetailApi>, settings: FetchSettings) -> Self {
        Self { api, settings }
    }

    pub async fn fetch_all(&self, records: Vec<DiscoveredRecord>, deadline: Instant) -> FetchOutcome {
        if records.is_empty() {
            return FetchOutcome::default();
        }

        if self.settings.health_check && !self.api.health().await {
            warn!(
                "Detail API unhealthy; emitting {} synthetic record(s)",
                records.len()
            );
            let reason = "detail API health check failed";
            let failures = records
                .iter()
                .map(|r| PipelineError::FetchFailure {
                    url: r.url.clone(),
                    reason: reason.to_string(),
                })
                .collect();
            return FetchOutcome {
                records: records
                    .into_iter()
                    .map(|r| DetailedRecord::synthetic(r, reason))
                    .collect(),
                failures,
                api_unreachable: true,
                timed_out: false,
            };
        }

        let total = records.len();
        let limiter = Semaphore::new(self.settings.concurrency.max(1));
        info!(
            "Fetching {total} detail record(s), concurrency {}",
            self.settings.concurrency
        );

        let attempts = join_all(records.into_iter().map(|record| {
            let limiter = &limiter;
            async move {
                let _permit = limiter.acquire().await.ok();
                self.fetch_one(record, deadline).await
            }
        }))
        .await;

        let mut outcome = FetchOutcome::default();
        let mut unreachable = 0;
        for attempted in attempts {
            if let Some((err, tries)) = attempted.error {
                // Running out of stage budget says nothing about the API.
                if err == FetchError::Timeout && Instant::now() >= deadline {
                    outcome.timed_out = true;
                } else if err.is_unreachable() {
                    unreachable += 1;
                }
                outcome.failures.push(PipelineError::FetchFailure {
                    url: attempted.record.url().to_string(),
                    reason: format!("{err} after {tries} attempt(s)"),
                });
            }
            outcome.records.push(attempted.record);
        }
        outcome.api_unreachable = unreachable == total;

        info!(
            "Fetched {} of {total} record(s), {} synthetic",
            total - outcome.synthetic_count(),
            outcome.synthetic_count()
        );
        outcome
    }

    async fn fetch_one(&self, source: DiscoveredRecord, deadline: Instant) -> Attempted {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Self::fallback(source, FetchError::Timeout, 0);
        }

        let api = &*self.api;
        let url = source.url.as_str();
        let fetch_comments = self.settings.fetch_comments;
        let label = format!("detail {url}");
        let retried = self.settings.retry.retry(
            &label,
            move |_| api.fetch_detail(url, fetch_comments),
            FetchError::is_retryable,
        );

        match tokio::time::timeout(remaining, retried).await {
            Ok(Ok(fields)) => Attempted {
                record: DetailedRecord {
                    source,
                    origin: ContentOrigin::Fetched,
                    content: fields.content,
                    images: fields.images,
                    video_url: fields.video_url,
                    author: fields.author,
                    tags: fields.tags,
                    created_at: fields.created_at,
                },
                error: None,
            },
            Ok(Err(exhausted)) => Self::fallback(source, exhausted.last_error, exhausted.attempts),
            Err(_) => Self::fallback(source, FetchError::Timeout, 0),
        }
    }

    fn fallback(source: DiscoveredRecord, err: FetchError, attempts: u32) -> Attempted {
        warn!(
            "Detail fetch for '{}' ({}) failed, using synthetic content: {err}",
            source.title, source.url
        );
        Attempted {
            record: DetailedRecord::synthetic(source, err.to_string()),
            error: Some((err, attempts)),
        }
    }
}
