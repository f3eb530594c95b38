//! Run-wide record of URLs that were (or are being) downloaded.
//!
//! Lives for one crawl run and is never persisted. It only saves network
//! round trips; the on-disk `{n}.jpg` check is what makes replays idempotent.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlState {
    InFlight,
    Done,
}

/// Thread-safe URL set shared by every download worker. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct DedupCache {
    urls: Arc<DashMap<String, UrlState>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the URL was downloaded or is being downloaded right now.
    pub fn seen(&self, url: &str) -> bool {
        self.urls.contains_key(url)
    }

    /// True only once the URL has been written to disk.
    pub fn is_done(&self, url: &str) -> bool {
        self.urls
            .get(url)
            .map(|state| *state == UrlState::Done)
            .unwrap_or(false)
    }

    /// Record a successful download.
    pub fn mark(&self, url: &str) {
        self.urls.insert(url.to_string(), UrlState::Done);
    }

    /// Atomically reserve `url` for the caller. Returns `false` if another
    /// caller already claimed it or it is already done.
    pub fn try_claim(&self, url: &str) -> bool {
        match self.urls.entry(url.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(UrlState::InFlight);
                true
            }
        }
    }

    /// Drop a claim that did not end in a download, so a later image may retry it.
    pub fn release(&self, url: &str) {
        self.urls
            .remove_if(url, |_, state| *state == UrlState::InFlight);
    }

    /// Number of URLs downloaded so far.
    pub fn len(&self) -> usize {
        self.urls
            .iter()
            .filter(|entry| *entry.value() == UrlState::Done)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
