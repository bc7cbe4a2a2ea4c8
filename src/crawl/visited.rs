//! Visited page tracking

use std::collections::HashSet;

use crate::utils::normalize_page_url;

/// Normalized URLs of pages already scheduled or visited by one crawl.
///
/// Grows monotonically; entries are never removed.
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `url` visited. Returns `false` if it already was.
    pub fn insert(&mut self, url: &str) -> bool {
        self.urls.insert(normalize_page_url(url))
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(&normalize_page_url(url))
    }

    /// Visited set restored from a checkpoint's URL list
    #[must_use]
    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> Self {
        let mut set = Self::new();
        for url in urls {
            set.insert(url.as_ref());
        }
        set
    }

    /// Every entry, sorted
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.urls.iter().cloned().collect();
        urls.sort();
        urls
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
