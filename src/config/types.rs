//! Core configuration types for media extraction runs
//!
//! This module contains the main `ScrapeConfig` struct that defines the
//! budgets, timeouts and policies of one run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dedup::{DuplicateAction, HashAlgorithm};
use crate::utils::{
    CHROME_USER_AGENT, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_HASH_DISTANCE, DEFAULT_MAX_CONCURRENT_RUNS, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES,
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_SCROLLS, DEFAULT_OPERATION_TIMEOUT_SECS,
    DEFAULT_PAGE_LOAD_TIMEOUT_SECS, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_REQUEST_DELAY_MS,
    DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_SCROLL_DELAY_MS, DEFAULT_SESSION_EXPIRY_HOURS,
    DEFAULT_STABLE_SCROLL_THRESHOLD, DEFAULT_UPGRADE_TARGET_PX,
};

/// Main configuration struct for extraction runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Seed URLs; each becomes one unit of work for the run controller
    pub(crate) start_urls: Vec<String>,
    pub(crate) headless: bool,

    /// Follow same-site content links discovered on visited pages
    ///
    /// Default: false
    pub(crate) follow_links: bool,
    pub(crate) max_depth: u8,

    /// Page budget per seed, shared by pagination and link following
    pub(crate) max_pages: usize,

    /// Item budget per seed. `None` means unbounded.
    pub(crate) max_items: Option<usize>,

    /// Walk numbered result pages after the seed page
    ///
    /// Default: true
    pub(crate) paginate: bool,
    pub(crate) max_scrolls: usize,
    pub(crate) scroll_delay_ms: u64,

    /// Consecutive unchanged heights that end scroll-to-load
    ///
    /// Default: 3
    pub(crate) stable_scroll_threshold: usize,

    /// Timeout in seconds for one navigation, including the load wait
    ///
    /// Default: 30 seconds
    pub(crate) page_load_timeout_secs: u64,

    /// Timeout in seconds for evaluate/click/fill style operations
    ///
    /// Default: 15 seconds
    pub(crate) operation_timeout_secs: u64,

    /// Timeout in milliseconds for one login-probe selector check
    ///
    /// Default: 2000 ms
    pub(crate) probe_timeout_ms: u64,

    /// Wall-clock budget for the whole run
    ///
    /// Default: 600 seconds
    pub(crate) run_timeout_secs: u64,

    /// Fixed delay between two requests issued by the same handler
    pub(crate) request_delay_ms: u64,

    /// Retries for timed-out navigations and failed HTTP requests
    ///
    /// Default: 2
    pub(crate) max_retries: u8,

    /// Seed URLs processed concurrently, one browser session each
    ///
    /// Default: 2
    pub(crate) max_concurrent_runs: usize,

    /// Drop items hosted off-site unless the trust policy vouches for them
    pub(crate) same_domain_only: bool,

    /// Confirm upgraded URLs with a HEAD request before adopting them
    ///
    /// Default: true
    pub(crate) verify_upgrades: bool,
    pub(crate) upgrade_target_px: u32,

    /// Collapse items whose canonical URLs match
    ///
    /// Default: true
    pub(crate) dedup_urls: bool,

    /// Items narrower than this are dropped; unknown widths pass
    ///
    /// Default: 0 (no minimum)
    pub(crate) min_width: u32,
    pub(crate) min_height: u32,

    /// Case-insensitive regexes; when non-empty, an item URL must match one
    pub(crate) include_patterns: Vec<String>,

    /// Case-insensitive regexes; an item URL matching any of them is dropped
    pub(crate) exclude_patterns: Vec<String>,

    /// Perceptual hashes within this many bits are the same image
    ///
    /// Default: 5
    pub(crate) hash_distance: u32,
    pub(crate) hash_algorithm: HashAlgorithm,

    /// What stage-2 deduplication does with a duplicate file
    ///
    /// Default: report only
    pub(crate) duplicate_action: DuplicateAction,

    /// JSON credentials document (see `auth::CredentialStore`)
    pub(crate) credentials_path: Option<PathBuf>,

    /// Directory for persisted browser sessions. `None` disables persistence.
    pub(crate) session_dir: Option<PathBuf>,
    pub(crate) session_expiry_hours: i64,

    /// Chrome user data directory for profile isolation
    pub(crate) chrome_data_dir: Option<PathBuf>,
    pub(crate) user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            start_urls: Vec::new(),
            headless: true,
            follow_links: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_pages: DEFAULT_MAX_PAGES,
            max_items: None,
            paginate: true,
            max_scrolls: DEFAULT_MAX_SCROLLS,
            scroll_delay_ms: DEFAULT_SCROLL_DELAY_MS,
            stable_scroll_threshold: DEFAULT_STABLE_SCROLL_THRESHOLD,
            page_load_timeout_secs: DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            max_concurrent_runs: DEFAULT_MAX_CONCURRENT_RUNS,
            same_domain_only: false,
            verify_upgrades: true,
            upgrade_target_px: DEFAULT_UPGRADE_TARGET_PX,
            dedup_urls: true,
            min_width: 0,
            min_height: 0,
            include_patterns: Vec::new(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
            hash_distance: DEFAULT_HASH_DISTANCE,
            hash_algorithm: HashAlgorithm::default(),
            duplicate_action: DuplicateAction::Report,
            credentials_path: None,
            session_dir: None,
            session_expiry_hours: DEFAULT_SESSION_EXPIRY_HOURS,
            chrome_data_dir: None,
            user_agent: CHROME_USER_AGENT.to_string(),
        }
    }
}
