//! Shared configuration constants for mediascrape
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Default maximum link-following depth: 1 level
///
/// Depth 0 is the seed page itself. One level captures gallery pages linked
/// from an index without wandering across the whole site.
pub const DEFAULT_MAX_DEPTH: u8 = 1;

/// Default page budget per seed URL (pagination plus followed links)
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Default upper bound on scroll-to-load iterations per page
pub const DEFAULT_MAX_SCROLLS: usize = 50;

/// Delay between scroll steps, giving lazy loaders time to append content
pub const DEFAULT_SCROLL_DELAY_MS: u64 = 500;

/// Consecutive unchanged page heights before scrolling is considered exhausted
pub const DEFAULT_STABLE_SCROLL_THRESHOLD: usize = 3;

/// Timeout for a single `navigate` call
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;

/// Timeout for any other single browser operation (evaluate, click, fill)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 15;

/// Timeout for one login-probe selector check
///
/// A probe that times out counts as "selector not found".
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Overall wall-clock budget for a run
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 600;

/// Fixed delay between requests issued by the same handler
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 250;

/// Bounded retries for timed-out navigations and HTTP requests
pub const DEFAULT_MAX_RETRIES: u8 = 2;

/// Number of seed URLs processed concurrently
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 2;

/// Long edge, in pixels, that numeric resolution tokens are raised to
pub const DEFAULT_UPGRADE_TARGET_PX: u32 = 1200;

/// Lifetime of a persisted browser session
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// Maximum Hamming distance between two 64-bit perceptual hashes that are
/// still considered the same image
pub const DEFAULT_HASH_DISTANCE: u32 = 5;

/// Case-insensitive URL patterns whose media is never collected unless the
/// config replaces them
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    r"/ads/",
    r"/advertisement",
    r"/pixel",
    r"/tracker",
    r"/tracking",
    r"/cdn-cgi/",
    r"/favicon",
    r"/icon",
    r"/logo",
    r"/avatar",
    r"sprite",
    r"spacer",
    r"blank\.gif",
];

/// Upper bound on candidate links inspected per page when following links
pub const MAX_LINKS_PER_PAGE: usize = 50;

/// Delay applied after each declarative login step unless the step sets its own
pub const DEFAULT_LOGIN_STEP_DELAY_MS: u64 = 200;

/// Netscape cookie expiry used for session cookies (2038-01-19)
pub const SESSION_COOKIE_EXPIRY: i64 = 2_147_483_647;

/// Chrome user agent string for stealth mode
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
