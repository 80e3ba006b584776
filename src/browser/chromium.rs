//! `BrowserSession` backed by a chromiumoxide page
//!
//! `chromiumoxide::element::Element` is not `Clone`, so found elements live in
//! an arena keyed by `ElementHandle` ids. The arena is cleared whenever the
//! page navigates; handles from the previous page then read as stale.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::launcher::{LaunchOptions, launch_browser};
use super::session::{BrowserSession, ElementHandle};
use crate::resilience::with_timeout;
use crate::selector::{Locator, LocatorKind};

pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
    page: Page,
    elements: Mutex<HashMap<u64, Element>>,
    next_id: AtomicU64,
    op_timeout: Duration,
}

impl ChromiumSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let (browser, handler) = launch_browser(options).await?;
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create blank page")?;

        info!("Browser session ready");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: std::sync::Mutex::new(Some(handler)),
            page,
            elements: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            op_timeout: options.op_timeout,
        })
    }

    async fn invalidate_handles(&self) {
        self.elements.lock().await.clear();
    }

    async fn register(&self, found: Vec<Element>) -> Vec<ElementHandle> {
        let mut arena = self.elements.lock().await;
        found
            .into_iter()
            .map(|el| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                arena.insert(id, el);
                ElementHandle::new(id)
            })
            .collect()
    }

    async fn query_page(&self, locator: &Locator) -> Result<Vec<Element>> {
        let found = match locator.kind {
            LocatorKind::Css => self.page.find_elements(locator.value.as_str()).await,
            LocatorKind::Xpath => self.page.find_xpaths(locator.value.as_str()).await,
            LocatorKind::Text => self.page.find_xpaths(text_xpath(&locator.value)?).await,
        };
        // chromiumoxide reports "no match" as an error for some lookups
        Ok(found.unwrap_or_default())
    }

    async fn query_scoped(&self, locator: &Locator, scope: ElementHandle) -> Result<Vec<Element>> {
        let arena = self.elements.lock().await;
        let root = arena
            .get(&scope.id())
            .ok_or_else(|| anyhow!("stale element handle {}", scope.id()))?;

        match locator.kind {
            LocatorKind::Css => Ok(root
                .find_elements(locator.value.as_str())
                .await
                .unwrap_or_default()),
            LocatorKind::Text => {
                let mut hits = Vec::new();
                for el in root.find_elements("*").await.unwrap_or_default() {
                    let text = el.inner_text().await.ok().flatten().unwrap_or_default();
                    if text.contains(locator.value.as_str()) {
                        hits.push(el);
                    }
                }
                Ok(hits)
            }
            LocatorKind::Xpath => Err(anyhow!(
                "xpath locator {locator} cannot be scoped to an element"
            )),
        }
    }
}

/// XPath selecting elements whose own text contains `needle`.
fn text_xpath(needle: &str) -> Result<String> {
    let quoted = if !needle.contains('\'') {
        format!("'{needle}'")
    } else if !needle.contains('"') {
        format!("\"{needle}\"")
    } else {
        return Err(anyhow!("text locator mixes both quote styles: {needle}"));
    };
    Ok(format!("//*[text()[contains(normalize-space(.), {quoted})]]"))
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn open(&self, url: &str) -> Result<()> {
        self.invalidate_handles().await;
        with_timeout(
            async {
                self.page
                    .goto(url)
                    .await
                    .with_context(|| format!("Failed to navigate to {url}"))?;
                Ok(())
            },
            self.op_timeout,
            "page.goto",
        )
        .await
    }

    async fn query(
        &self,
        locator: &Locator,
        scope: Option<ElementHandle>,
    ) -> Result<Vec<ElementHandle>> {
        let found = with_timeout(
            async {
                match scope {
                    None => self.query_page(locator).await,
                    Some(handle) => self.query_scoped(locator, handle).await,
                }
            },
            self.op_timeout,
            "element query",
        )
        .await?;
        Ok(self.register(found).await)
    }

    async fn read_text(&self, handle: ElementHandle) -> Result<String> {
        let arena = self.elements.lock().await;
        let el = arena
            .get(&handle.id())
            .ok_or_else(|| anyhow!("stale element handle {}", handle.id()))?;
        let text = with_timeout(
            async { el.inner_text().await.context("Failed to read inner text") },
            self.op_timeout,
            "inner_text",
        )
        .await?;
        Ok(text.unwrap_or_default())
    }

    async fn read_attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>> {
        let arena = self.elements.lock().await;
        let el = arena
            .get(&handle.id())
            .ok_or_else(|| anyhow!("stale element handle {}", handle.id()))?;
        with_timeout(
            async {
                el.attribute(name)
                    .await
                    .with_context(|| format!("Failed to read attribute {name}"))
            },
            self.op_timeout,
            "attribute",
        )
        .await
    }

    async fn click(&self, handle: ElementHandle) -> Result<()> {
        let arena = self.elements.lock().await;
        let el = arena
            .get(&handle.id())
            .ok_or_else(|| anyhow!("stale element handle {}", handle.id()))?;
        with_timeout(
            async {
                el.scroll_into_view().await.context("Failed to scroll element into view")?;
                el.click().await.context("Failed to click element")?;
                Ok(())
            },
            self.op_timeout,
            "click",
        )
        .await
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<bool> {
        let settled = match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => return Err(anyhow!("wait_for_navigation failed: {e}")),
            Err(_) => {
                debug!("Navigation not confirmed within {:?}", timeout);
                false
            }
        };
        self.invalidate_handles().await;
        Ok(settled)
    }

    async fn close(&self) -> Result<()> {
        self.invalidate_handles().await;
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
        }
        if let Ok(mut guard) = self.handler.lock()
            && let Some(handler) = guard.take()
        {
            handler.abort();
        }
        info!("Browser session closed");
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.handler.lock()
            && let Some(handler) = guard.take()
        {
            warn!("ChromiumSession dropped without close() - aborting handler task");
            handler.abort();
        }
    }
}
