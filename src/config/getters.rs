//! Getter methods for `ScrapeConfig`
//!
//! This module provides all the accessor methods for retrieving configuration
//! values from a `ScrapeConfig` instance.

use std::path::Path;
use std::time::Duration;

use super::types::ScrapeConfig;
use crate::dedup::{DuplicateAction, HashAlgorithm};

impl ScrapeConfig {
    #[must_use]
    pub fn start_urls(&self) -> &[String] {
        &self.start_urls
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn follow_links(&self) -> bool {
        self.follow_links
    }

    #[must_use]
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn max_items(&self) -> Option<usize> {
        self.max_items
    }

    #[must_use]
    pub fn paginate(&self) -> bool {
        self.paginate
    }

    #[must_use]
    pub fn max_scrolls(&self) -> usize {
        self.max_scrolls
    }

    #[must_use]
    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    #[must_use]
    pub fn stable_scroll_threshold(&self) -> usize {
        self.stable_scroll_threshold
    }

    /// Returns the configured timeout for a navigation.
    #[must_use]
    pub fn page_load_timeout_secs(&self) -> u64 {
        self.page_load_timeout_secs
    }

    /// Returns the configured timeout for non-navigation browser operations.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    #[must_use]
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    #[must_use]
    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    #[must_use]
    pub fn max_concurrent_runs(&self) -> usize {
        self.max_concurrent_runs
    }

    #[must_use]
    pub fn same_domain_only(&self) -> bool {
        self.same_domain_only
    }

    #[must_use]
    pub fn verify_upgrades(&self) -> bool {
        self.verify_upgrades
    }

    #[must_use]
    pub fn upgrade_target_px(&self) -> u32 {
        self.upgrade_target_px
    }

    #[must_use]
    pub fn dedup_urls(&self) -> bool {
        self.dedup_urls
    }

    #[must_use]
    pub fn min_width(&self) -> u32 {
        self.min_width
    }

    #[must_use]
    pub fn min_height(&self) -> u32 {
        self.min_height
    }

    #[must_use]
    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    #[must_use]
    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    #[must_use]
    pub fn hash_distance(&self) -> u32 {
        self.hash_distance
    }

    #[must_use]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    #[must_use]
    pub fn duplicate_action(&self) -> &DuplicateAction {
        &self.duplicate_action
    }

    #[must_use]
    pub fn credentials_path(&self) -> Option<&Path> {
        self.credentials_path.as_deref()
    }

    #[must_use]
    pub fn session_dir(&self) -> Option<&Path> {
        self.session_dir.as_deref()
    }

    #[must_use]
    pub fn session_expiry_hours(&self) -> i64 {
        self.session_expiry_hours
    }

    #[must_use]
    pub fn chrome_data_dir(&self) -> Option<&Path> {
        self.chrome_data_dir.as_deref()
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
