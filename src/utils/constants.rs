//! Shared defaults for the discovery and orchestration pipeline
//!
//! Values here are the fallbacks used by `PipelineConfig::builder()` when a
//! field is not set explicitly or through the environment.

/// Maximum number of list pages visited during discovery.
///
/// Hot-post lists are ranked, so the first few pages carry nearly all the
/// signal; later pages mostly repeat or decay.
pub const DEFAULT_MAX_PAGES: usize = 5;

/// Upper bound on distinct records kept after aggregation.
pub const DEFAULT_RECORD_CAP: usize = 200;

/// Parallel detail requests in flight at once.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Attempts per url before a synthetic record is emitted.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between detail attempts.
pub const DEFAULT_FETCH_BACKOFF_MS: u64 = 1_000;

/// Full sweeps over a selector's candidate list before giving up.
pub const DEFAULT_SELECTOR_ATTEMPTS: u32 = 3;

/// Base delay between selector sweeps.
pub const DEFAULT_SELECTOR_BACKOFF_MS: u64 = 500;

/// How long a single candidate locator is polled before moving on.
pub const DEFAULT_SELECTOR_WAIT_MS: u64 = 2_000;

/// Poll interval while waiting on a candidate locator.
pub const SELECTOR_POLL_INTERVAL_MS: u64 = 100;

/// Page-load confirmation budget after navigation or a "next" click.
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout against the detail API and HTTP collaborators.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Number of records sent to the analysis collaborator.
pub const DEFAULT_ANALYSIS_LIMIT: usize = 3;

/// Consecutive unreadable list items after which a page is abandoned.
pub const DEFAULT_MAX_CONSECUTIVE_ITEM_FAILURES: usize = 3;

/// Score at or above which an analysis counts as high-performing.
pub const HIGH_SCORE_THRESHOLD: f64 = 80.0;

/// Success formulas reported in the analysis summary.
pub const MAX_SUCCESS_FORMULAS: usize = 5;

/// Detail API used when neither config nor environment names one.
pub const DEFAULT_DETAIL_API_ENDPOINT: &str = "http://localhost:8000";

/// Health check path on the detail API.
pub const DETAIL_HEALTH_PATH: &str = "/api/v1/data/health";

/// Stored note content, `GET {path}/{note_id}`.
pub const DETAIL_CONTENT_PATH: &str = "/api/v1/data/content/xhs";

/// Crawl task creation; status lives at `{path}/{task_id}/status`.
pub const CRAWL_TASKS_PATH: &str = "/api/v1/tasks";

/// Comments requested per note when comment fetching is on.
pub const DEFAULT_MAX_COMMENTS: usize = 100;

/// Gap between crawl task status polls.
pub const DEFAULT_TASK_POLL_INTERVAL_MS: u64 = 5_000;

/// Longest a single crawl task is waited on.
pub const DEFAULT_TASK_MAX_WAIT_SECS: u64 = 300;

/// Default list page (content-inspiration hot notes).
pub const DEFAULT_LIST_URL: &str = "https://ad.xiaohongshu.com/microapp/traffic-guide/contentInspiration/";

/// Base used to absolutise relative item hrefs.
pub const DEFAULT_SITE_BASE_URL: &str = "https://www.xiaohongshu.com";

/// Default target-domain pattern for discovered urls.
pub const DEFAULT_TARGET_DOMAIN_PATTERN: &str = r"^https?://([a-z0-9-]+\.)*xiaohongshu\.com/";

/// File name of the persisted pipeline snapshot inside the output directory.
pub const STATE_FILE_NAME: &str = "pipeline_state.json";

/// Marker carried in the content of every synthetic detail record.
pub const SYNTHETIC_CONTENT_MARKER: &str = "[synthetic placeholder]";

/// Chrome user agent string used by the launched browser.
///
/// Updated with the Chrome stable channel; stale agents are a common
/// trigger for anti-automation interstitials.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
