use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::utils::constants::CHROME_USER_AGENT;

/// How the discovery browser is launched.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Persistent profile directory. Cookies and login state survive between
    /// runs when this is stable; `None` uses a per-process temp profile.
    pub profile_dir: Option<PathBuf>,
    /// Bound on every individual CDP operation.
    pub op_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            profile_dir: None,
            op_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySource {
    /// `CHROMIUM_PATH`
    Env,
    /// A well-known install location for this platform.
    Installed,
    /// First match on `PATH`.
    SearchPath,
    /// Downloaded into the user cache by chromiumoxide's fetcher.
    Managed,
}

#[derive(Debug, Clone)]
pub struct BrowserBinary {
    pub path: PathBuf,
    pub source: BinarySource,
}

const EXECUTABLE_NAMES: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

fn install_locations() -> Vec<PathBuf> {
    let fixed: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    };

    let mut locations: Vec<PathBuf> = fixed.iter().map(PathBuf::from).collect();
    if cfg!(target_os = "macos")
        && let Some(home) = dirs::home_dir()
    {
        locations.push(home.join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));
    }
    locations
}

/// Walks `search_path` (a `PATH`-style list) for the first known browser name.
fn search_path_for_browser(search_path: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_path)
        .flat_map(|dir| EXECUTABLE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Locates a local Chrome/Chromium: `CHROMIUM_PATH`, then install locations,
/// then `PATH`.
pub fn locate_browser() -> Option<BrowserBinary> {
    if let Some(raw) = std::env::var_os("CHROMIUM_PATH") {
        let path = PathBuf::from(raw);
        if path.exists() {
            return Some(BrowserBinary {
                path,
                source: BinarySource::Env,
            });
        }
        warn!("CHROMIUM_PATH points at a missing file: {}", path.display());
    }

    if let Some(path) = install_locations().into_iter().find(|p| p.exists()) {
        return Some(BrowserBinary {
            path,
            source: BinarySource::Installed,
        });
    }

    std::env::var_os("PATH")
        .and_then(|p| search_path_for_browser(&p))
        .map(|path| BrowserBinary {
            path,
            source: BinarySource::SearchPath,
        })
}

/// Downloads a Chromium build into `<cache>/notescout/chromium`.
pub async fn download_managed_browser() -> Result<BrowserBinary> {
    let cache_root = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    let target = cache_root.join("notescout").join("chromium");
    std::fs::create_dir_all(&target)
        .with_context(|| format!("creating browser cache {}", target.display()))?;

    info!("No local browser found, fetching Chromium into {}", target.display());
    let options = BrowserFetcherOptions::builder()
        .with_path(&target)
        .build()
        .context("configuring browser fetcher")?;
    let installed = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("downloading Chromium")?;

    Ok(BrowserBinary {
        path: installed.executable_path,
        source: BinarySource::Managed,
    })
}

fn profile_dir(options: &LaunchOptions) -> PathBuf {
    options.profile_dir.clone().unwrap_or_else(|| {
        std::env::temp_dir().join(format!("notescout_profile_{}", std::process::id()))
    })
}

fn is_benign_handler_error(message: &str) -> bool {
    // chromiumoxide cannot decode every CDP event Chrome emits.
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}

/// Launch a browser for discovery.
///
/// The returned `JoinHandle` drives the CDP event stream and must be aborted
/// once the browser is closed.
pub async fn launch_browser(options: &LaunchOptions) -> Result<(Browser, JoinHandle<()>)> {
    let binary = match locate_browser() {
        Some(found) => found,
        None => download_managed_browser().await?,
    };
    debug!("Using browser {:?} from {:?}", binary.path, binary.source);

    let profile = profile_dir(options);
    ensure_dir(&profile)?;

    let mut builder = BrowserConfigBuilder::default()
        .chrome_executable(binary.path)
        .user_data_dir(profile)
        .request_timeout(options.op_timeout)
        .window_size(1440, 900);
    builder = if options.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };
    for flag in [
        "--disable-blink-features=AutomationControlled",
        "--disable-notifications",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--use-mock-keychain",
        "--mute-audio",
    ] {
        builder = builder.arg(flag);
    }
    let config = builder
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .build()
        .map_err(|e| anyhow::anyhow!("invalid browser config: {e}"))?;

    info!("Launching browser (headless: {})", options.headless);
    let (browser, mut events) = Browser::launch(config)
        .await
        .context("launching browser")?;

    let driver = task::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Err(e) if is_benign_handler_error(&e.to_string()) => {
                    trace!("Ignoring undecodable CDP event: {e}");
                }
                Err(e) => error!("Browser event stream error: {e:?}"),
                Ok(()) => {}
            }
        }
        debug!("Browser event stream closed");
    });

    Ok((browser, driver))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating browser profile {}", dir.display()))
}
