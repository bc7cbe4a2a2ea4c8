//! Run results

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::AuthMethod;
use crate::crawl::{CrawlCheckpoint, StopReason};
use crate::handlers::Strategy;
use crate::media::MediaItem;
use crate::pipeline::LogEntry;

/// Outcome for one start URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedReport {
    pub url: String,
    pub handler: String,
    /// `None` when no credential matched the seed
    pub auth_method: Option<AuthMethod>,
    pub authenticated: bool,
    pub strategy_used: Option<Strategy>,
    pub pages_visited: usize,
    /// Items found for this seed before cross-seed deduplication
    pub items_found: usize,
    pub stop_reason: StopReason,
    pub errors: Vec<String>,
    /// Where the crawl can pick up again; absent once the seed is exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CrawlCheckpoint>,
    /// Carried over unchanged from the report this run resumed
    #[serde(default)]
    pub resumed: bool,
}

impl SeedReport {
    pub(crate) fn skipped(url: &str, handler: &str, stop_reason: StopReason) -> Self {
        Self {
            url: url.to_string(),
            handler: handler.to_string(),
            auth_method: None,
            authenticated: false,
            strategy_used: None,
            pages_visited: 0,
            items_found: 0,
            stop_reason,
            errors: Vec::new(),
            checkpoint: None,
            resumed: false,
        }
    }

    /// Nothing is left to crawl for this seed
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.checkpoint.is_none()
            && !matches!(self.stop_reason, StopReason::Cancelled | StopReason::Deadline)
    }
}

/// Everything a run produced, including partial results after
/// cancellation or deadline expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub items: Vec<MediaItem>,
    pub seeds: Vec<SeedReport>,
    pub total_pages_visited: usize,
    /// Items removed by URL deduplication across all seeds
    pub duplicates_removed: usize,
    /// Items carried over from a previous report
    #[serde(default)]
    pub resumed_items: usize,
    pub cancelled: bool,
    pub timed_out: bool,
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

impl RunReport {
    /// The run ended before every seed was exhausted
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.cancelled || self.timed_out
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse run report")
    }

    /// Read a report written by a previous run
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run report {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Failed to load run report {}", path.display()))
    }
}
