//! Detail-content API client

use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::Instant;

use super::error::FetchError;
use super::payload::{
    ContentLookup, CrawlTaskRequest, DetailFields, TaskCreated, TaskPhase, TaskStatus,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::utils::constants::{
    CRAWL_TASKS_PATH, DEFAULT_MAX_COMMENTS, DEFAULT_TASK_MAX_WAIT_SECS,
    DEFAULT_TASK_POLL_INTERVAL_MS, DETAIL_CONTENT_PATH, DETAIL_HEALTH_PATH,
};
use crate::utils::{extract_note_id, join_endpoint};

type FetchResult<T> = std::result::Result<T, FetchError>;

/// Note url -> content retrieval.
#[async_trait]
pub trait DetailApi: Send + Sync {
    /// Whether the API is up. Implementations without a health route report healthy.
    async fn health(&self) -> bool {
        true
    }

    async fn fetch_detail(
        &self,
        url: &str,
        fetch_comments: bool,
    ) -> std::result::Result<DetailFields, FetchError>;
}

/// Client for a MediaCrawler-style API.
///
/// A note is read from the crawler's content store. On a miss a one-note
/// detail task is queued, its status polled until it settles, and the store
/// read again.
pub struct HttpDetailClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_comments: usize,
    poll_interval: Duration,
    max_wait: Duration,
}

impl HttpDetailClient {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
            max_comments: DEFAULT_MAX_COMMENTS,
            poll_interval: Duration::from_millis(DEFAULT_TASK_POLL_INTERVAL_MS),
            max_wait: Duration::from_secs(DEFAULT_TASK_MAX_WAIT_SECS),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(
            config.detail_api_endpoint(),
            config.detail_api_key(),
            config.request_timeout(),
        )?
        .with_max_comments(config.max_comments())
        .with_task_polling(config.task_poll_interval(), config.task_max_wait()))
    }

    #[must_use]
    pub fn with_max_comments(mut self, max: usize) -> Self {
        self.max_comments = max;
        self
    }

    /// How often task status is polled, and how long a task may run.
    #[must_use]
    pub fn with_task_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = interval;
        self.max_wait = max_wait;
        self
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Stored content for `note_id`, `None` when the crawler has not seen it.
    async fn lookup(&self, note_id: &str) -> FetchResult<Option<DetailFields>> {
        let endpoint = join_endpoint(&self.base_url, &format!("{DETAIL_CONTENT_PATH}/{note_id}"));
        debug!("GET {endpoint}");

        let resp = self.authorize(self.client.get(&endpoint)).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let lookup: ContentLookup = resp.json().await?;
        lookup.into_cached()
    }

    async fn create_task(&self, note_id: &str, url: &str, fetch_comments: bool) -> FetchResult<String> {
        let endpoint = join_endpoint(&self.base_url, CRAWL_TASKS_PATH);
        let body = CrawlTaskRequest::detail(note_id, url, fetch_comments, self.max_comments);

        let resp = self
            .authorize(self.client.post(&endpoint))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let created: TaskCreated = resp.json().await?;
        let task_id = created.into_task_id()?;
        info!("Queued detail task {task_id} for note {note_id}");
        Ok(task_id)
    }

    async fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        let endpoint = join_endpoint(&self.base_url, &format!("{CRAWL_TASKS_PATH}/{task_id}/status"));
        let resp = match self.authorize(self.client.get(&endpoint)).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("Status of task {task_id} returned HTTP {}", resp.status());
                return None;
            }
            Err(e) => {
                warn!("Status of task {task_id} unavailable: {e}");
                return None;
            }
        };
        match resp.json::<TaskStatus>().await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Unreadable status for task {task_id}: {e}");
                None
            }
        }
    }

    /// Poll until the task settles. An unanswered status request counts as
    /// still running.
    async fn wait_for_task(&self, task_id: &str) -> FetchResult<()> {
        let started = Instant::now();
        loop {
            if let Some(status) = self.task_status(task_id).await {
                match status.phase() {
                    TaskPhase::Succeeded => {
                        debug!("Task {task_id} finished after {:?}", started.elapsed());
                        return Ok(());
                    }
                    TaskPhase::Failed => {
                        return Err(FetchError::TaskFailed {
                            task_id: task_id.to_string(),
                            reason: status.label().to_string(),
                        });
                    }
                    TaskPhase::Pending => debug!("Task {task_id} is {}", status.label()),
                }
            }

            let waited = started.elapsed();
            if waited + self.poll_interval > self.max_wait {
                return Err(FetchError::TaskTimedOut {
                    task_id: task_id.to_string(),
                    waited,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl DetailApi for HttpDetailClient {
    async fn health(&self) -> bool {
        let url = join_endpoint(&self.base_url, DETAIL_HEALTH_PATH);
        let reply = self
            .authorize(self.client.get(&url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match reply {
            Ok(resp) if resp.status().is_success() => {
                info!("Detail API healthy at {}", self.base_url);
                true
            }
            Ok(resp) => {
                warn!("Detail API health check returned HTTP {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Detail API health check failed: {e}");
                false
            }
        }
    }

    async fn fetch_detail(&self, url: &str, fetch_comments: bool) -> FetchResult<DetailFields> {
        let note_id = extract_note_id(url)
            .ok_or_else(|| FetchError::Rejected(format!("no note id in {url}")))?;

        if let Some(cached) = self.lookup(&note_id).await? {
            debug!("Note {note_id} served from the content store");
            return Ok(cached);
        }

        let task_id = self.create_task(&note_id, url, fetch_comments).await?;
        self.wait_for_task(&task_id).await?;

        self.lookup(&note_id).await?.ok_or_else(|| {
            FetchError::Rejected(format!(
                "task {task_id} finished but note {note_id} has no stored content"
            ))
        })
    }
}
