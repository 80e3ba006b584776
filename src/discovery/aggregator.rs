//! Discovery aggregator
//!
//! Merges per-page record sequences into one ordered, url-deduplicated set.
//! The first occurrence of a url wins and keeps its first-seen position.

use log::debug;
use std::collections::HashSet;

use crate::records::DiscoveredRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMerge {
    pub accepted: usize,
    pub duplicates: usize,
    /// Records dropped because the record cap filled mid-page.
    pub over_cap: usize,
    /// The whole page was refused because a bound had already been reached.
    pub refused: bool,
}

#[derive(Debug)]
pub struct DiscoveryAggregator {
    record_cap: usize,
    max_pages: usize,
    pages: usize,
    duplicates: usize,
    seen: HashSet<String>,
    records: Vec<DiscoveredRecord>,
}

impl DiscoveryAggregator {
    #[must_use]
    pub fn new(record_cap: usize, max_pages: usize) -> Self {
        Self {
            record_cap,
            max_pages,
            pages: 0,
            duplicates: 0,
            seen: HashSet::new(),
            records: Vec::new(),
        }
    }

    /// No further pages will be accepted.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.record_cap || self.pages >= self.max_pages
    }

    pub fn accept_page(&mut self, page: Vec<DiscoveredRecord>) -> PageMerge {
        if self.is_full() {
            return PageMerge {
                refused: true,
                ..PageMerge::default()
            };
        }
        self.pages += 1;

        let mut merge = PageMerge::default();
        let total = page.len();
        for (i, record) in page.into_iter().enumerate() {
            if self.records.len() >= self.record_cap {
                merge.over_cap = total - i;
                break;
            }
            if self.seen.insert(record.url.clone()) {
                self.records.push(record);
                merge.accepted += 1;
            } else {
                debug!("duplicate url skipped: {}", record.url);
                merge.duplicates += 1;
            }
        }
        self.duplicates += merge.duplicates;
        merge
    }

    #[must_use]
    pub fn records(&self) -> &[DiscoveredRecord] {
        &self.records
    }

    #[must_use]
    pub fn pages(&self) -> usize {
        self.pages
    }

    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    #[must_use]
    pub fn into_records(self) -> Vec<DiscoveredRecord> {
        self.records
    }
}
