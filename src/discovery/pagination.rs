//! Pagination controller
//!
//! Finite-state driver over the list view:
//!
//! ```text
//! Idle -> Loading -> Ready <-> Loading -> NoMore
//!                       \-> Error (load not confirmed)
//! ```
//!
//! `advance()` is the only mutating operation. Reaching `max_pages` forces
//! `NoMore` as soon as the last allowed page has loaded, so a caller that
//! stops on a terminal cursor issues at most `max_pages` calls.
//!
//! The list re-renders in place, so the container is present before and
//! after a next-page click. A click only counts as a page load once the
//! first item's identity has changed; a click that leaves it unchanged
//! means the list has no more pages.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::browser::BrowserSession;
use crate::error::{PipelineError, Result};
use crate::selector::{ElementKey, ResolverSettings, SelectorResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No "next" affordance was found.
    Exhausted,
    /// `max_pages` pages have been loaded.
    PageCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CursorState {
    Idle,
    Loading,
    Ready,
    NoMore(StopReason),
    Error,
}

impl CursorState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NoMore(_) | Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    /// Pages successfully loaded so far; also the index of the current page.
    pub page_index: usize,
    pub max_pages: usize,
    pub state: CursorState,
}

/// Outcome of one `advance()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A new page is ready for extraction.
    Loaded { page: usize },
    /// Nothing was loaded; the cursor is terminal.
    Stopped(CursorState),
}

pub struct PaginationController<'a> {
    session: &'a dyn BrowserSession,
    resolver: &'a SelectorResolver<'a>,
    /// Single-sweep lookups for reading the current first item.
    quick: SelectorResolver<'a>,
    list_url: &'a str,
    load_timeout: Duration,
    cursor: PaginationCursor,
    advance_calls: usize,
    last_error: Option<PipelineError>,
}

impl<'a> PaginationController<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        resolver: &'a SelectorResolver<'a>,
        list_url: &'a str,
        load_timeout: Duration,
        max_pages: usize,
    ) -> Self {
        Self {
            session,
            resolver,
            quick: resolver.with_settings(ResolverSettings::instant()),
            list_url,
            load_timeout,
            cursor: PaginationCursor {
                page_index: 0,
                max_pages,
                state: CursorState::Idle,
            },
            advance_calls: 0,
            last_error: None,
        }
    }

    #[must_use]
    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    /// Calls to `advance()` so far, including ones on a terminal cursor.
    #[must_use]
    pub fn advance_calls(&self) -> usize {
        self.advance_calls
    }

    /// The failure that moved the cursor to `Error`, taken once.
    pub fn take_error(&mut self) -> Option<PipelineError> {
        self.last_error.take()
    }

    pub async fn advance(&mut self) -> Advance {
        self.advance_calls += 1;

        match self.cursor.state {
            CursorState::NoMore(_) | CursorState::Error => {
                return Advance::Stopped(self.cursor.state);
            }
            CursorState::Loading => {
                // Only reachable if a previous advance was cancelled mid-flight.
                return self.fail(PipelineError::InvariantViolation(
                    "advance() while a page load is in flight".to_string(),
                ));
            }
            CursorState::Idle | CursorState::Ready => {}
        }

        if self.cursor.page_index >= self.cursor.max_pages {
            self.transition(CursorState::NoMore(StopReason::PageCap));
            return Advance::Stopped(self.cursor.state);
        }

        let first = self.cursor.state == CursorState::Idle;
        self.transition(CursorState::Loading);

        if first {
            if let Err(e) = self.session.open(self.list_url).await {
                return self.fail(PipelineError::from(e));
            }
            if let Err(e) = self.confirm_load().await {
                return self.fail(e);
            }
        } else {
            let next = match self.resolver.resolve(ElementKey::NextPage).await {
                Ok(next) => next,
                Err(PipelineError::ElementNotFound { .. }) => {
                    info!(
                        "No next-page affordance after page {}; list exhausted",
                        self.cursor.page_index
                    );
                    self.transition(CursorState::NoMore(StopReason::Exhausted));
                    return Advance::Stopped(self.cursor.state);
                }
                Err(e) => return self.fail(e),
            };
            debug!("next-page via candidate #{} ({})", next.candidate_index, next.locator);
            let before = self.first_item_identity().await;
            if let Err(e) = self.session.click(next.handle).await {
                return self.fail(PipelineError::from(e));
            }
            if let Err(e) = self.confirm_load().await {
                return self.fail(e);
            }
            if let Some(before) = before
                && !self.wait_for_new_items(&before).await
            {
                info!(
                    "List unchanged after next-page click on page {}; list exhausted",
                    self.cursor.page_index
                );
                self.transition(CursorState::NoMore(StopReason::Exhausted));
                return Advance::Stopped(self.cursor.state);
            }
        }

        self.cursor.page_index += 1;
        let page = self.cursor.page_index;
        if page >= self.cursor.max_pages {
            info!("Loaded page {page}, page cap {} reached", self.cursor.max_pages);
            self.transition(CursorState::NoMore(StopReason::PageCap));
        } else {
            info!("Loaded page {page}");
            self.transition(CursorState::Ready);
        }
        Advance::Loaded { page }
    }

    /// Navigation settled and the list container resolves within the
    /// selector budget.
    async fn confirm_load(&self) -> Result<()> {
        let target = if self.cursor.page_index == 0 {
            self.list_url.to_string()
        } else {
            format!("page {}", self.cursor.page_index + 1)
        };
        let timeout_err = || PipelineError::NavigationTimeout {
            target: target.clone(),
            timeout: self.load_timeout,
        };

        match self.session.wait_for_load(self.load_timeout).await {
            Ok(true) => {}
            Ok(false) => return Err(timeout_err()),
            Err(e) => {
                warn!("load wait for {target} failed: {e:#}");
                return Err(timeout_err());
            }
        }

        match self.resolver.resolve(ElementKey::ListContainer).await {
            Ok(_) => Ok(()),
            Err(PipelineError::ElementNotFound { .. }) => Err(timeout_err()),
            Err(e) => Err(e),
        }
    }

    /// Title and link of the first list item, whichever can be read.
    async fn first_item_identity(&self) -> Option<String> {
        let item = self.quick.find_in(ElementKey::ListItem, None).await.ok()??.handle;

        let mut parts = Vec::new();
        if let Ok(Some(title)) = self.quick.find_in(ElementKey::ItemTitle, Some(item)).await
            && let Ok(text) = self.session.read_text(title.handle).await
        {
            parts.push(text.trim().to_string());
        }
        if let Ok(Some(link)) = self.quick.find_in(ElementKey::ItemLink, Some(item)).await
            && let Ok(Some(href)) = self.session.read_attribute(link.handle, "href").await
        {
            parts.push(href);
        }
        parts.retain(|p| !p.is_empty());
        (!parts.is_empty()).then(|| parts.join(" | "))
    }

    /// Poll until the first item differs from `before`, within the load timeout.
    async fn wait_for_new_items(&self, before: &str) -> bool {
        let deadline = Instant::now() + self.load_timeout;
        let interval = self.resolver.settings().poll_interval.max(Duration::from_millis(1));
        loop {
            match self.first_item_identity().await {
                Some(now) if now != before => return true,
                _ => {}
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn transition(&mut self, to: CursorState) {
        debug!("cursor {:?} -> {:?}", self.cursor.state, to);
        self.cursor.state = to;
    }

    fn fail(&mut self, err: PipelineError) -> Advance {
        warn!(
            "Pagination stopped after {} page(s): {err}",
            self.cursor.page_index
        );
        self.last_error = Some(err);
        self.transition(CursorState::Error);
        Advance::Stopped(self.cursor.state)
    }
}
