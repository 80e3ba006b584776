//! Capability interface over one browser page context
//!
//! The discovery engine only ever talks to a page through this trait. The
//! page context cannot serve concurrent interaction, so a session is used by
//! one navigation/extraction sequence at a time.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::selector::Locator;

/// Opaque reference to an element found by a previous `query`.
///
/// Handles are invalidated by navigation (`open`, or a click that loads a
/// new page); reading a stale handle is an error, not a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(u64);

impl ElementHandle {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the page to `url`.
    async fn open(&self, url: &str) -> Result<()>;

    /// Instant, non-waiting lookup of every element matching `locator`,
    /// optionally scoped to the subtree under `scope`.
    async fn query(&self, locator: &Locator, scope: Option<ElementHandle>)
    -> Result<Vec<ElementHandle>>;

    async fn read_text(&self, handle: ElementHandle) -> Result<String>;

    async fn read_attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<String>>;

    async fn click(&self, handle: ElementHandle) -> Result<()>;

    /// Wait until the current navigation settles. `Ok(false)` means the
    /// budget elapsed without confirmation.
    async fn wait_for_load(&self, timeout: Duration) -> Result<bool>;

    /// Release the page and any browser process behind it.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
