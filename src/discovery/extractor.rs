//! Record extractor
//!
//! Reads one list page into validated `DiscoveredRecord`s. Reading (DOM
//! access) and validation (pure) are separate steps: `PageExtractor` produces
//! `RawListing`s, `RecordValidator` turns each into a record or a
//! `RecordValidationFailure` carrying the reason.
//!
//! When the catalog has a detail trigger, metrics and the note link live in a
//! per-note modal: the card title is read and gated first, then the modal is
//! opened, read and closed again.

use log::{debug, warn};
use regex::Regex;
use std::collections::HashSet;

use crate::browser::{BrowserSession, ElementHandle};
use crate::config::{KeywordRules, PipelineConfig, Precedence};
use crate::error::{PipelineError, Result};
use crate::records::{DiscoveredRecord, Metric, Metrics};
use crate::selector::{ElementKey, ResolverSettings, SelectorResolver};
use crate::utils::{extract_note_id, normalize_whitespace, preview, resolve_href};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricParseError {
    #[error("empty value")]
    Empty,
    #[error("negative value '{0}'")]
    Negative(String),
    #[error("not a number '{0}'")]
    Invalid(String),
    #[error("value '{0}' overflows")]
    Overflow(String),
}

/// Parse a displayed metric into an integer.
///
/// `万` (or `w`) multiplies by 10⁴, `千` (or `k`) by 10³. Thousands
/// separators and a trailing `+` are ignored. Fractions are applied exactly
/// and the result truncated, so `"1.25万"` is 12500 and `"12.7"` is 12.
///
/// ```
/// # use notescout::discovery::extractor::parse_metric;
/// assert_eq!(parse_metric("1.2万"), Ok(12_000));
/// assert_eq!(parse_metric("3千"), Ok(3_000));
/// assert_eq!(parse_metric("150"), Ok(150));
/// ```
pub fn parse_metric(raw: &str) -> std::result::Result<u64, MetricParseError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '，')
        .collect();
    let cleaned = cleaned.trim_end_matches('+');
    if cleaned.is_empty() {
        return Err(MetricParseError::Empty);
    }
    if cleaned.starts_with('-') {
        return Err(MetricParseError::Negative(raw.trim().to_string()));
    }

    let mut chars = cleaned.chars();
    let (number, multiplier) = match chars.next_back() {
        Some('万' | 'w' | 'W') => (chars.as_str(), 10_000u64),
        Some('千' | 'k' | 'K') => (chars.as_str(), 1_000u64),
        _ => (cleaned, 1u64),
    };

    let invalid = || MetricParseError::Invalid(raw.trim().to_string());
    let overflow = || MetricParseError::Overflow(raw.trim().to_string());

    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, f),
        None => (number, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| overflow())?
    };
    let mut value = whole.checked_mul(multiplier).ok_or_else(overflow)?;

    // Fraction digits beyond the multiplier's precision truncate away.
    let mut scale = multiplier;
    for digit in frac_part.bytes().map(|b| u64::from(b - b'0')) {
        scale /= 10;
        if scale == 0 {
            break;
        }
        value = value.checked_add(digit * scale).ok_or_else(overflow)?;
    }
    Ok(value)
}

/// Placeholder shown for metrics the site has no data for.
fn is_placeholder(raw: &str) -> bool {
    let t = raw.trim();
    !t.is_empty() && t.chars().all(|c| matches!(c, '-' | '—' | '–'))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relevance {
    pub relevant: bool,
    pub score: f64,
}

/// Classify a title against the keyword rules.
///
/// The score is the share of target keywords found in the title (1.0 when
/// no targets are configured) and 0.0 whenever the title is judged not
/// relevant. A title hitting both sets is decided by `rules.precedence`.
#[must_use]
pub fn classify(title: &str, rules: &KeywordRules) -> Relevance {
    let title = title.to_lowercase();
    let contains = |kw: &str| {
        let kw = kw.trim().to_lowercase();
        !kw.is_empty() && title.contains(&kw)
    };

    let targets: Vec<&String> = rules.target.iter().filter(|k| !k.trim().is_empty()).collect();
    let target_hits = targets.iter().filter(|k| contains(k.as_str())).count();
    let excluded = rules.exclude.iter().any(|k| contains(k.as_str()));
    let target_ok = targets.is_empty() || target_hits > 0;

    let relevant = match rules.precedence {
        Precedence::ExcludeWins => target_ok && !excluded,
        Precedence::TargetWins => target_hits > 0 || (target_ok && !excluded),
    };
    let score = match (relevant, targets.len()) {
        (false, _) => 0.0,
        (true, 0) => 1.0,
        (true, n) => target_hits as f64 / n as f64,
    };
    Relevance { relevant, score }
}

/// Text fields read off one list item before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub title: String,
    pub href: Option<String>,
    /// `(label, value)` pairs in card order.
    pub metrics: Vec<(String, String)>,
}

pub struct RecordValidator<'a> {
    pub target_domain: &'a Regex,
    pub site_base_url: &'a str,
    pub keywords: &'a KeywordRules,
}

impl<'a> RecordValidator<'a> {
    pub fn from_config(config: &'a PipelineConfig) -> Self {
        Self {
            target_domain: config.target_domain(),
            site_base_url: config.site_base_url(),
            keywords: config.keywords(),
        }
    }

    /// `position` is the 1-based item index on `page`, used as the record's
    /// identity when it has no title.
    pub fn validate(&self, raw: &RawListing, page: usize, position: usize) -> Result<DiscoveredRecord> {
        let title = normalize_whitespace(&raw.title);
        let identity = if title.is_empty() {
            format!("page {page} item {position}")
        } else {
            preview(&title, 40)
        };
        let reject = |reason: String| PipelineError::RecordValidationFailure {
            record: identity.clone(),
            reason,
        };

        if title.is_empty() {
            return Err(reject("empty title".to_string()));
        }

        let href = raw
            .href
            .as_deref()
            .ok_or_else(|| reject("missing link".to_string()))?;
        let url = resolve_href(self.site_base_url, href)
            .ok_or_else(|| reject(format!("unresolvable link '{href}'")))?;
        if !self.target_domain.is_match(&url) {
            return Err(reject(format!("url '{url}' outside target domain")));
        }

        let mut metrics = Metrics::default();
        let mut seen: Vec<Metric> = Vec::new();
        for (label, value) in &raw.metrics {
            let Some(metric) = Metric::from_label(label) else {
                debug!("{identity}: ignoring unknown metric label '{label}'");
                continue;
            };
            if seen.contains(&metric) {
                continue;
            }
            seen.push(metric);
            if is_placeholder(value) {
                continue;
            }
            let parsed = parse_metric(value)
                .map_err(|e| reject(format!("metric '{}': {e}", label.trim())))?;
            metrics.set(metric, parsed);
        }

        let relevance = classify(&title, self.keywords);
        Ok(DiscoveredRecord {
            note_id: extract_note_id(&url),
            title,
            url,
            metrics,
            relevant: relevance.relevant,
            relevance_score: relevance.score,
            page,
        })
    }
}

/// Result of reading one page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub records: Vec<DiscoveredRecord>,
    /// Dropped items and read failures, each naming its record.
    pub failures: Vec<PipelineError>,
    pub items_seen: usize,
    /// Items passed over because their title failed the relevance gate.
    pub irrelevant_skipped: usize,
    /// Modal items passed over because a card with the same title was read
    /// earlier in the run.
    pub repeats_skipped: usize,
    /// Reading stopped early after too many consecutive unreadable items.
    pub aborted: bool,
}

enum ItemRead {
    Listing(RawListing),
    Irrelevant,
    Repeat,
}

pub struct PageExtractor<'a> {
    session: &'a dyn BrowserSession,
    /// For the item list itself, which may still be rendering.
    list_resolver: &'a SelectorResolver<'a>,
    /// For fields inside an item, which are present or not.
    field_resolver: SelectorResolver<'a>,
    validator: RecordValidator<'a>,
    max_consecutive_failures: usize,
    relevant_only: bool,
    /// Normalised titles whose detail modal has been read.
    opened_titles: HashSet<String>,
}

impl<'a> PageExtractor<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        resolver: &'a SelectorResolver<'a>,
        validator: RecordValidator<'a>,
        max_consecutive_failures: usize,
    ) -> Self {
        Self {
            session,
            list_resolver: resolver,
            field_resolver: resolver.with_settings(ResolverSettings::instant()),
            validator,
            max_consecutive_failures: max_consecutive_failures.max(1),
            relevant_only: false,
            opened_titles: HashSet::new(),
        }
    }

    /// Skip items whose title is not relevant before reading anything else.
    #[must_use]
    pub fn relevant_only(mut self, enabled: bool) -> Self {
        self.relevant_only = enabled;
        self
    }

    /// Extract every item on the current page, in page order.
    ///
    /// Fails only when the item list itself cannot be resolved.
    pub async fn extract_page(&mut self, page: usize) -> Result<PageExtraction> {
        let items = self.list_resolver.resolve(ElementKey::ListItem).await?;
        debug!(
            "page {page}: {} item(s) via candidate #{} ({})",
            items.matches.len(),
            items.candidate_index,
            items.locator
        );

        let mut out = PageExtraction::default();
        let mut consecutive = 0usize;

        for (i, item) in items.matches.iter().enumerate() {
            let position = i + 1;
            out.items_seen += 1;

            let raw = match self.read_item(*item).await {
                Ok(ItemRead::Listing(raw)) => {
                    consecutive = 0;
                    raw
                }
                Ok(ItemRead::Irrelevant) => {
                    consecutive = 0;
                    out.irrelevant_skipped += 1;
                    continue;
                }
                Ok(ItemRead::Repeat) => {
                    consecutive = 0;
                    out.repeats_skipped += 1;
                    continue;
                }
                Err(e) => {
                    consecutive += 1;
                    warn!("page {page} item {position}: unreadable: {e}");
                    out.failures.push(PipelineError::RecordValidationFailure {
                        record: format!("page {page} item {position}"),
                        reason: format!("unreadable item: {e}"),
                    });
                    if consecutive >= self.max_consecutive_failures {
                        warn!(
                            "page {page}: {consecutive} consecutive unreadable items, abandoning page"
                        );
                        out.aborted = true;
                        break;
                    }
                    continue;
                }
            };

            match self.validator.validate(&raw, page, position) {
                Ok(record) => out.records.push(record),
                Err(e) => {
                    warn!("page {page} item {position}: dropped: {e}");
                    out.failures.push(e);
                }
            }
        }

        Ok(out)
    }

    async fn read_item(&mut self, item: ElementHandle) -> Result<ItemRead> {
        let title = match self
            .field_resolver
            .find_in(ElementKey::ItemTitle, Some(item))
            .await?
        {
            Some(found) => self.session.read_text(found.handle).await?,
            None => String::new(),
        };
        let normalized = normalize_whitespace(&title);

        if self.relevant_only
            && !normalized.is_empty()
            && !classify(&normalized, self.validator.keywords).relevant
        {
            debug!("skipping irrelevant '{}'", preview(&normalized, 40));
            return Ok(ItemRead::Irrelevant);
        }

        let trigger = self
            .field_resolver
            .find_in(ElementKey::DetailTrigger, Some(item))
            .await?;
        let mut raw = match trigger {
            Some(trigger) => {
                if !normalized.is_empty() && self.opened_titles.contains(&normalized) {
                    debug!("'{}' already read, not reopening", preview(&normalized, 40));
                    return Ok(ItemRead::Repeat);
                }
                let raw = self.read_through_modal(item, trigger.handle, &normalized).await?;
                if !normalized.is_empty() {
                    self.opened_titles.insert(normalized);
                }
                raw
            }
            None => RawListing {
                href: self.card_link(item).await?,
                metrics: self.read_metrics(Some(item)).await?,
                ..RawListing::default()
            },
        };
        raw.title = title;
        Ok(ItemRead::Listing(raw))
    }

    /// Open the card's detail modal, read it and close it. Closing is
    /// attempted even when the read failed.
    async fn read_through_modal(
        &self,
        item: ElementHandle,
        trigger: ElementHandle,
        title: &str,
    ) -> Result<RawListing> {
        self.session.click(trigger).await?;
        let read = self.read_modal(item, title).await;
        let closed = self.close_modal().await;
        let raw = read?;
        closed?;
        Ok(raw)
    }

    async fn read_modal(&self, item: ElementHandle, title: &str) -> Result<RawListing> {
        let heading = self.list_resolver.resolve(ElementKey::DetailTitle).await?;
        let shown = normalize_whitespace(&self.session.read_text(heading.handle).await?);
        if shown != title {
            warn!(
                "detail modal shows '{}' for card '{}'",
                preview(&shown, 40),
                preview(title, 40)
            );
        }

        let metrics = self.read_metrics(None).await?;
        let shared = match self.field_resolver.find_in(ElementKey::DetailLink, None).await? {
            Some(found) => self.link_of(found.handle).await?,
            None => None,
        };
        let href = match shared {
            Some(href) => Some(href),
            None => self.card_link(item).await?,
        };
        Ok(RawListing {
            title: String::new(),
            href,
            metrics,
        })
    }

    async fn close_modal(&self) -> Result<()> {
        let close = self.list_resolver.resolve(ElementKey::DetailClose).await?;
        self.session.click(close.handle).await?;
        Ok(())
    }

    /// A copy-link control carries the url in `data-clipboard-text`.
    async fn link_of(&self, handle: ElementHandle) -> Result<Option<String>> {
        for attribute in ["data-clipboard-text", "href"] {
            if let Some(value) = self.session.read_attribute(handle, attribute).await?
                && !value.trim().is_empty()
            {
                return Ok(Some(value.trim().to_string()));
            }
        }
        Ok(None)
    }

    async fn card_link(&self, item: ElementHandle) -> Result<Option<String>> {
        match self
            .field_resolver
            .find_in(ElementKey::ItemLink, Some(item))
            .await?
        {
            Some(link) => Ok(self.session.read_attribute(link.handle, "href").await?),
            None => Ok(None),
        }
    }

    /// Label/value pairs under `scope`, or page-wide for an open modal.
    async fn read_metrics(&self, scope: Option<ElementHandle>) -> Result<Vec<(String, String)>> {
        let mut metrics = Vec::new();
        if let Some(cells) = self.field_resolver.find_in(ElementKey::MetricCell, scope).await? {
            for cell in cells.matches {
                let label = self.read_field(ElementKey::MetricLabel, cell).await?;
                let value = self.read_field(ElementKey::MetricValue, cell).await?;
                if let (Some(label), Some(value)) = (label, value) {
                    metrics.push((label, value));
                }
            }
        }
        Ok(metrics)
    }

    async fn read_field(&self, key: ElementKey, scope: ElementHandle) -> Result<Option<String>> {
        match self.field_resolver.find_in(key, Some(scope)).await? {
            Some(found) => Ok(Some(self.session.read_text(found.handle).await?)),
            None => Ok(None),
        }
    }
}
