//! Ranked candidate locators for logical page elements
//!
//! A `SelectorSpec` is an ordered fallback chain. Order is priority: the
//! resolver never looks at candidate N+1 while candidate N can still match.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Css,
    Xpath,
    /// Visible-text substring match.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorKind,
    pub value: String,
}

impl Locator {
    pub fn css(value: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Css,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Xpath,
            value: value.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Text,
            value: value.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            LocatorKind::Css => "css",
            LocatorKind::Xpath => "xpath",
            LocatorKind::Text => "text",
        };
        write!(f, "{tag}:{}", self.value)
    }
}

/// Ordered candidate list for one logical element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorSpec {
    candidates: Vec<Locator>,
}

impl SelectorSpec {
    #[must_use]
    pub fn new(candidates: Vec<Locator>) -> Self {
        Self { candidates }
    }

    #[must_use]
    pub fn candidates(&self) -> &[Locator] {
        &self.candidates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl From<Vec<Locator>> for SelectorSpec {
    fn from(candidates: Vec<Locator>) -> Self {
        Self::new(candidates)
    }
}

/// Logical elements the discovery flow needs to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKey {
    /// Container whose presence confirms a list page has rendered.
    ListContainer,
    ListItem,
    ItemTitle,
    ItemLink,
    MetricCell,
    MetricLabel,
    MetricValue,
    NextPage,
    /// Clickable part of a list card that opens its detail modal.
    DetailTrigger,
    /// Modal heading; its presence confirms the modal rendered.
    DetailTitle,
    /// Element in the modal carrying the shareable note link.
    DetailLink,
    DetailClose,
}

impl ElementKey {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListContainer => "list_container",
            Self::ListItem => "list_item",
            Self::ItemTitle => "item_title",
            Self::ItemLink => "item_link",
            Self::MetricCell => "metric_cell",
            Self::MetricLabel => "metric_label",
            Self::MetricValue => "metric_value",
            Self::NextPage => "next_page",
            Self::DetailTrigger => "detail_trigger",
            Self::DetailTitle => "detail_title",
            Self::DetailLink => "detail_link",
            Self::DetailClose => "detail_close",
        }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selector configuration for every `ElementKey`.
///
/// Deserialisable so a changed page layout can be patched from a JSON file
/// without a rebuild; omitted keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorCatalog {
    pub list_container: SelectorSpec,
    pub list_item: SelectorSpec,
    pub item_title: SelectorSpec,
    pub item_link: SelectorSpec,
    pub metric_cell: SelectorSpec,
    pub metric_label: SelectorSpec,
    pub metric_value: SelectorSpec,
    pub next_page: SelectorSpec,
    /// Leave empty to read metrics and links straight off the list cards.
    pub detail_trigger: SelectorSpec,
    pub detail_title: SelectorSpec,
    pub detail_link: SelectorSpec,
    pub detail_close: SelectorSpec,
}

impl SelectorCatalog {
    #[must_use]
    pub fn get(&self, key: ElementKey) -> &SelectorSpec {
        match key {
            ElementKey::ListContainer => &self.list_container,
            ElementKey::ListItem => &self.list_item,
            ElementKey::ItemTitle => &self.item_title,
            ElementKey::ItemLink => &self.item_link,
            ElementKey::MetricCell => &self.metric_cell,
            ElementKey::MetricLabel => &self.metric_label,
            ElementKey::MetricValue => &self.metric_value,
            ElementKey::NextPage => &self.next_page,
            ElementKey::DetailTrigger => &self.detail_trigger,
            ElementKey::DetailTitle => &self.detail_title,
            ElementKey::DetailLink => &self.detail_link,
            ElementKey::DetailClose => &self.detail_close,
        }
    }

    /// Whether list items are read through their detail modal.
    #[must_use]
    pub fn reads_detail_modal(&self) -> bool {
        !self.detail_trigger.is_empty()
    }

    /// Keys with no candidates; a catalog with any of these cannot drive discovery.
    ///
    /// The modal title and close control are required only when a detail
    /// trigger is configured. The modal link is optional; the card link
    /// stands in for it.
    #[must_use]
    pub fn empty_keys(&self) -> Vec<ElementKey> {
        let modal: &[ElementKey] = if self.reads_detail_modal() {
            &[ElementKey::DetailTitle, ElementKey::DetailClose]
        } else {
            &[]
        };
        [
            ElementKey::ListContainer,
            ElementKey::ListItem,
            ElementKey::ItemTitle,
            ElementKey::ItemLink,
            ElementKey::MetricCell,
            ElementKey::MetricLabel,
            ElementKey::MetricValue,
            ElementKey::NextPage,
        ]
        .into_iter()
        .chain(modal.iter().copied())
        .filter(|k| self.get(*k).is_empty())
        .collect()
    }
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self {
            list_container: SelectorSpec::new(vec![
                Locator::css(".grid-card"),
                Locator::css("#content-core-notes"),
                Locator::xpath(r#"//*[@id="content-core-notes"]"#),
            ]),
            list_item: SelectorSpec::new(vec![
                Locator::css(r#"[class*="d-grid-item"][style*="grid-area: span 1 / span 4"]"#),
                Locator::css(r#"[class*="d-grid-item"]"#),
                Locator::css(".grid-card .note-item"),
            ]),
            item_title: SelectorSpec::new(vec![
                Locator::css(".title"),
                Locator::css(r#"[class*="title"]"#),
            ]),
            item_link: SelectorSpec::new(vec![
                Locator::css(r#"a[href*="/explore/"]"#),
                Locator::css(r#"a[href*="/note/"]"#),
                Locator::css("a[href]"),
            ]),
            metric_cell: SelectorSpec::new(vec![
                Locator::css(".interaction-card-item"),
                Locator::css(r#"[class*="interaction-card-item"]"#),
            ]),
            metric_label: SelectorSpec::new(vec![
                Locator::css(".interaction-card-item-label text"),
                Locator::css(".interaction-card-item-label"),
            ]),
            metric_value: SelectorSpec::new(vec![Locator::css(".interaction-card-item-value")]),
            // Disabled controls stay in the DOM on the last page.
            next_page: SelectorSpec::new(vec![
                Locator::css(".d-pagination-page-next:not(.disabled):not([disabled])"),
                Locator::xpath(
                    r#"//*[@id="content-core-notes"]//*[normalize-space(text())="下一页"][not(ancestor-or-self::*[contains(@class,"disabled") or @disabled or @aria-disabled="true"])]"#,
                ),
            ]),
            detail_trigger: SelectorSpec::new(vec![
                Locator::css("#content-core-notes .title"),
                Locator::css(r#"#content-core-notes [class*="title"]"#),
            ]),
            detail_title: SelectorSpec::new(vec![
                Locator::css(".interaction-title"),
                Locator::css(r#"[class*="interaction-title"]"#),
            ]),
            detail_link: SelectorSpec::new(vec![
                Locator::css(r#"[data-clipboard-text*="xiaohongshu.com"]"#),
                Locator::xpath(r#"//*[normalize-space(text())="复制小红书笔记链接"]/ancestor-or-self::*[@data-clipboard-text][1]"#),
            ]),
            detail_close: SelectorSpec::new(vec![
                Locator::xpath(r#"//div[normalize-space(text())="笔记详情"]/..//*[name()="svg" or name()="img"]"#),
                Locator::css(r#"[class*="modal"] [class*="close"]"#),
            ]),
        }
    }
}
