//! Per-invocation extraction context and the run's structured log
//!
//! Handlers receive the log sink through the context instead of reaching for
//! a global logger, so every attempt and skip reason ends up in the report.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::run::RunGuard;

/// Severity of a structured log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// One structured record: what happened, where, at which stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub stage: String,
    pub url: String,
    pub message: String,
}

/// Append-only log shared by every worker of a run
///
/// Entries are mirrored to the `log` facade under `mediascrape::<stage>`.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RunLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, level: LogLevel, stage: &str, url: &str, message: impl Into<String>) {
        let message = message.into();
        let target = format!("mediascrape::{stage}");
        log::log!(target: &target, log::Level::from(level), "[{url}] {message}");
        self.entries.lock().push(LogEntry {
            timestamp: Utc::now(),
            level,
            stage: stage.to_string(),
            url: url.to_string(),
            message,
        });
    }

    pub fn debug(&self, stage: &str, url: &str, message: impl Into<String>) {
        self.record(LogLevel::Debug, stage, url, message);
    }

    pub fn info(&self, stage: &str, url: &str, message: impl Into<String>) {
        self.record(LogLevel::Info, stage, url, message);
    }

    pub fn warn(&self, stage: &str, url: &str, message: impl Into<String>) {
        self.record(LogLevel::Warn, stage, url, message);
    }

    pub fn error(&self, stage: &str, url: &str, message: impl Into<String>) {
        self.record(LogLevel::Error, stage, url, message);
    }

    /// Snapshot of all entries so far
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Entries recorded for one stage
    #[must_use]
    pub fn entries_for(&self, stage: &str) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Coarse kind of page a handler recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PageClassification {
    /// Collection of many items (album, gallery, board)
    Gallery,
    /// A single item's own page
    Detail,
    /// Search results or any paged index
    Listing,
    /// A user's or artist's page
    Profile,
    #[default]
    Unknown,
}

/// Handler's view of a URL: what kind of page it is and any ids in it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub page_type: PageClassification,
    pub identifiers: BTreeMap<String, String>,
}

/// Page-level metadata used to backfill item titles and credits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Everything one pipeline invocation knows about its target
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub target_url: String,
    pub page_type: PageClassification,
    pub identifiers: BTreeMap<String, String>,
    pub page_meta: PageMeta,
    /// Items still allowed for this seed; `None` is unbounded
    pub remaining_budget: Option<usize>,
    pub guard: RunGuard,
    pub log: RunLog,
    pub user_agent: String,
}

impl ExtractionContext {
    #[must_use]
    pub fn new(target_url: impl Into<String>, guard: RunGuard, log: RunLog) -> Self {
        Self {
            target_url: target_url.into(),
            page_type: PageClassification::Unknown,
            identifiers: BTreeMap::new(),
            page_meta: PageMeta::default(),
            remaining_budget: None,
            guard,
            log,
            user_agent: crate::utils::CHROME_USER_AGENT.to_string(),
        }
    }

    #[must_use]
    pub fn with_page_info(mut self, info: PageInfo) -> Self {
        self.page_type = info.page_type;
        self.identifiers = info.identifiers;
        self
    }

    #[must_use]
    pub fn with_budget(mut self, remaining: Option<usize>) -> Self {
        self.remaining_budget = remaining;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Whether the item budget is already spent
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.remaining_budget == Some(0)
    }
}
