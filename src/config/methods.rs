//! Builder methods available for all states
//!
//! This module contains methods that can be called on the builder
//! regardless of its current type state.

use std::path::PathBuf;

use super::builder::ScrapeConfigBuilder;
use crate::dedup::{DuplicateAction, HashAlgorithm};

impl<State> ScrapeConfigBuilder<State> {
    /// Set browser headless mode (visible vs invisible browser window)
    ///
    /// Headed mode is useful for watching a login sequence while writing
    /// credentials; it needs a display server.
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    #[must_use]
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.config.follow_links = follow;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u8) -> Self {
        self.config.max_depth = depth;
        self
    }

    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    #[must_use]
    pub fn max_items(mut self, items: usize) -> Self {
        self.config.max_items = Some(items);
        self
    }

    #[must_use]
    pub fn paginate(mut self, paginate: bool) -> Self {
        self.config.paginate = paginate;
        self
    }

    /// Scroll-to-load limits: maximum iterations and the delay between them
    #[must_use]
    pub fn scrolling(mut self, max_scrolls: usize, delay_ms: u64) -> Self {
        self.config.max_scrolls = max_scrolls;
        self.config.scroll_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn stable_scroll_threshold(mut self, checks: usize) -> Self {
        self.config.stable_scroll_threshold = checks.max(1);
        self
    }

    #[must_use]
    pub fn page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_load_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn operation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.operation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn probe_timeout_ms(mut self, millis: u64) -> Self {
        self.config.probe_timeout_ms = millis;
        self
    }

    #[must_use]
    pub fn run_timeout_secs(mut self, secs: u64) -> Self {
        self.config.run_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn request_delay_ms(mut self, millis: u64) -> Self {
        self.config.request_delay_ms = millis;
        self
    }

    /// Set maximum retries for timed-out navigations and HTTP requests
    ///
    /// Set to 0 to make the first timeout final.
    #[must_use]
    pub fn max_retries(mut self, retries: u8) -> Self {
        self.config.max_retries = retries;
        self
    }

    #[must_use]
    pub fn max_concurrent_runs(mut self, workers: usize) -> Self {
        self.config.max_concurrent_runs = workers;
        self
    }

    #[must_use]
    pub fn same_domain_only(mut self, same_domain_only: bool) -> Self {
        self.config.same_domain_only = same_domain_only;
        self
    }

    #[must_use]
    pub fn verify_upgrades(mut self, verify: bool) -> Self {
        self.config.verify_upgrades = verify;
        self
    }

    #[must_use]
    pub fn upgrade_target_px(mut self, px: u32) -> Self {
        self.config.upgrade_target_px = px;
        self
    }

    #[must_use]
    pub fn dedup_urls(mut self, dedup: bool) -> Self {
        self.config.dedup_urls = dedup;
        self
    }

    /// Minimum pixel size of collected items; items of unknown size pass
    #[must_use]
    pub fn min_dimensions(mut self, width: u32, height: u32) -> Self {
        self.config.min_width = width;
        self.config.min_height = height;
        self
    }

    #[must_use]
    pub fn include_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.include_patterns.push(pattern.into());
        self
    }

    /// Replace the exclusion patterns, defaults included
    #[must_use]
    pub fn exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.exclude_patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn hash_distance(mut self, bits: u32) -> Self {
        self.config.hash_distance = bits;
        self
    }

    #[must_use]
    pub fn hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.config.hash_algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn duplicate_action(mut self, action: DuplicateAction) -> Self {
        self.config.duplicate_action = action;
        self
    }

    #[must_use]
    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.credentials_path = Some(path.into());
        self
    }

    /// Persist authenticated sessions under `dir`, valid for `expiry_hours`
    #[must_use]
    pub fn session_dir(mut self, dir: impl Into<PathBuf>, expiry_hours: i64) -> Self {
        self.config.session_dir = Some(dir.into());
        self.config.session_expiry_hours = expiry_hours;
        self
    }

    #[must_use]
    pub fn chrome_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.chrome_data_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }
}
