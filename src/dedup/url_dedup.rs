//! Stage 1: exact deduplication by canonical URL

use std::collections::HashSet;

use crate::media::MediaItem;
use crate::utils::canonical_media_url;

/// First-seen-wins filter keyed by [`canonical_media_url`]
#[derive(Debug, Default, Clone)]
pub struct UrlDeduplicator {
    seen: HashSet<String>,
    removed: usize,
}

impl UrlDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `item` is the first with its canonical URL
    pub fn admit(&mut self, item: &MediaItem) -> bool {
        let fresh = self.seen.insert(canonical_media_url(&item.url));
        if !fresh {
            self.removed += 1;
        }
        fresh
    }

    /// Keep the first occurrence of each canonical URL, preserving order
    pub fn dedup(&mut self, items: Vec<MediaItem>) -> Vec<MediaItem> {
        items.into_iter().filter(|item| self.admit(item)).collect()
    }

    /// Number of items rejected so far
    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed
    }
}
