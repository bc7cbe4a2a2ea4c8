//! Core types for crawling: queue entries, stop reasons and failure
//! classification for retry decisions.

use serde::{Deserialize, Serialize};

use crate::errors::ExtractError;

/// Represents an item in the crawl queue with URL and depth tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlQueue {
    pub url: String,
    /// Link-following depth; the seed and its numbered pages are depth 0
    pub depth: u8,
    /// Number of retry attempts for this URL (0 = first attempt)
    #[serde(default)]
    pub retry_count: u8,
    /// Position in a paginated listing (0 = not reached through pagination)
    #[serde(default)]
    pub page_index: usize,
}

impl CrawlQueue {
    #[must_use]
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
            retry_count: 0,
            page_index: 0,
        }
    }

    /// Same entry scheduled for another attempt
    #[must_use]
    pub fn retried(&self) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            ..self.clone()
        }
    }
}

/// Where a crawl that stopped early can pick up again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCheckpoint {
    pub seed: String,
    /// Normalized URLs already scheduled or processed; never processed again
    pub visited: Vec<String>,
    /// Entries still queued when the crawl stopped, in queue order
    pub pending: Vec<CrawlQueue>,
}

/// Why a crawl stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Queue drained
    Completed,
    PageBudget,
    ItemBudget,
    Cancelled,
    Deadline,
    /// The handler cannot extract this source at all
    Failed,
}

impl StopReason {
    /// Stop reason for an error that ended the crawl
    #[must_use]
    pub fn from_error(error: &ExtractError) -> Self {
        match error {
            ExtractError::Cancelled => Self::Cancelled,
            ExtractError::DeadlineExceeded => Self::Deadline,
            _ => Self::Failed,
        }
    }
}

/// Categorizes page failures for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, DNS, connection failures; usually transient
    Network,
    /// CDP or page failures; may recover with backoff
    Browser,
    /// Content extraction failure; unlikely to recover
    ContentExtraction,
    /// HTTP 429 or explicit throttling
    RateLimited,
    /// The run was stopped; never retried
    Stopped,
    Unknown,
}

impl FailureKind {
    /// Classify an error by variant, falling back to message patterns for
    /// opaque transport errors
    #[must_use]
    pub fn classify(error: &ExtractError) -> Self {
        match error {
            ExtractError::Cancelled | ExtractError::DeadlineExceeded => return Self::Stopped,
            ExtractError::NavigationTimeout { .. } | ExtractError::OperationTimeout { .. } => {
                return Self::Network;
            }
            ExtractError::Json(_) | ExtractError::InvalidUrl(_) | ExtractError::StrategyError { .. } => {
                return Self::ContentExtraction;
            }
            ExtractError::Http(e) if e.status().is_some_and(|s| s.as_u16() == 429) => {
                return Self::RateLimited;
            }
            ExtractError::Browser(_) => return Self::Browser,
            _ => {}
        }

        let msg = error.to_string().to_lowercase();
        if msg.contains("429") || msg.contains("too many requests") || msg.contains("rate limit") {
            return Self::RateLimited;
        }
        if msg.contains("timeout")
            || msg.contains("timed out")
            || msg.contains("connection refused")
            || msg.contains("connection reset")
            || msg.contains("dns")
            || msg.contains("unreachable")
        {
            return Self::Network;
        }
        if msg.contains("browser") || msg.contains("chrome") || msg.contains("cdp") {
            return Self::Browser;
        }
        Self::Unknown
    }

    /// Whether this failure kind should be retried by default
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::Browser | Self::RateLimited | Self::Unknown => true,
            Self::ContentExtraction | Self::Stopped => false,
        }
    }

    /// Base delay multiplier for this failure kind
    #[must_use]
    pub const fn delay_multiplier(&self) -> f64 {
        match self {
            Self::Browser => 1.5,
            Self::RateLimited => 3.0,
            Self::Network | Self::ContentExtraction | Self::Stopped | Self::Unknown => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_retryable_network_failures() {
        let kind = FailureKind::classify(&ExtractError::NavigationTimeout {
            url: "https://example.com".into(),
            secs: 30,
        });
        assert_eq!(kind, FailureKind::Network);
        assert!(kind.is_retryable());
    }

    #[test]
    fn stops_are_never_retried() {
        assert!(!FailureKind::classify(&ExtractError::Cancelled).is_retryable());
        assert!(!FailureKind::classify(&ExtractError::DeadlineExceeded).is_retryable());
    }

    #[test]
    fn opaque_messages_fall_back_to_patterns() {
        let kind = FailureKind::classify(&ExtractError::Other("HTTP 429 Too Many Requests".into()));
        assert_eq!(kind, FailureKind::RateLimited);
        assert_eq!(kind.delay_multiplier(), 3.0);
    }
}
