//! Records flowing between stages
//!
//! `DiscoveredRecord`s come out of discovery and are never modified after
//! that. A `DetailedRecord` always carries the `DiscoveredRecord` it was built
//! from, whether its content was fetched or synthesised.

use serde::{Deserialize, Serialize};

use crate::utils::constants::SYNTHETIC_CONTENT_MARKER;

/// The six engagement metrics shown on a list card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Impression,
    Click,
    Like,
    Collect,
    Comment,
    Engage,
}

impl Metric {
    /// Map a card label (`总曝光量`, `总点赞量`, ... or English) to a metric.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        let table: [(&[&str], Metric); 6] = [
            (&["曝光", "impression"], Metric::Impression),
            (&["阅读", "click", "read"], Metric::Click),
            (&["点赞", "like"], Metric::Like),
            (&["收藏", "collect", "favorite"], Metric::Collect),
            (&["评论", "comment"], Metric::Comment),
            (&["互动", "engage"], Metric::Engage),
        ];
        table
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| label.contains(n)))
            .map(|(_, metric)| *metric)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub impression: u64,
    pub click: u64,
    pub like: u64,
    pub collect: u64,
    pub comment: u64,
    pub engage: u64,
}

impl Metrics {
    pub fn set(&mut self, metric: Metric, value: u64) {
        match metric {
            Metric::Impression => self.impression = value,
            Metric::Click => self.click = value,
            Metric::Like => self.like = value,
            Metric::Collect => self.collect = value,
            Metric::Comment => self.comment = value,
            Metric::Engage => self.engage = value,
        }
    }

    #[must_use]
    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Impression => self.impression,
            Metric::Click => self.click,
            Metric::Like => self.like,
            Metric::Collect => self.collect,
            Metric::Comment => self.comment,
            Metric::Engage => self.engage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredRecord {
    pub title: String,
    /// Unique key across a discovery run.
    pub url: String,
    pub note_id: Option<String>,
    pub metrics: Metrics,
    pub relevant: bool,
    /// Share of target keywords found in the title, 0.0..=1.0.
    pub relevance_score: f64,
    /// 1-based list page the record was read from.
    pub page: usize,
}

/// Where a `DetailedRecord`'s content came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentOrigin {
    Fetched,
    /// Placeholder content substituted after the fetch failed.
    Synthetic { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub name: String,
    pub user_id: Option<String>,
    pub followers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRecord {
    pub source: DiscoveredRecord,
    pub origin: ContentOrigin,
    pub content: String,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub author: AuthorInfo,
    pub tags: Vec<String>,
    /// RFC 3339 when the API supplied a parseable time.
    pub created_at: Option<String>,
}

impl DetailedRecord {
    /// Placeholder for a record whose content could not be retrieved.
    #[must_use]
    pub fn synthetic(source: DiscoveredRecord, reason: impl Into<String>) -> Self {
        let content = format!(
            "{SYNTHETIC_CONTENT_MARKER} content unavailable for \"{}\"",
            source.title
        );
        Self {
            source,
            origin: ContentOrigin::Synthetic {
                reason: reason.into(),
            },
            content,
            images: Vec::new(),
            video_url: None,
            author: AuthorInfo::default(),
            tags: Vec::new(),
            created_at: None,
        }
    }

    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self.origin, ContentOrigin::Synthetic { .. })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.source.url
    }
}
