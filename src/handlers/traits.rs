//! The site handler plugin contract
//!
//! A handler declares what it can do (strategies, pagination, trust) and
//! implements extraction for the strategies it supports. Everything except
//! `name` and `can_handle` has a default, so a minimal handler is a domain
//! predicate plus one extraction method.

use async_trait::async_trait;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::trust::default_is_cdn_host;
use crate::browser::BrowserSession;
use crate::errors::ExtractResult;
use crate::media::MediaItem;
use crate::pipeline::{ExtractionContext, HttpClient, PageInfo};

/// Default priority; the generic fallback sits below every real handler
pub const DEFAULT_PRIORITY: i32 = 100;

/// Default named-segment substitutions for thumbnails
pub const DEFAULT_SIZE_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("thumbs", "large"),
    ("thumb", "large"),
    ("thumbnail", "original"),
    ("thumbnails", "originals"),
    ("small", "large"),
    ("medium", "large"),
];

/// Controls clicked when scroll-to-load stalls
pub const DEFAULT_LOAD_MORE_SELECTORS: &[&str] = &[
    "button.load-more",
    ".load-more button",
    "a.load-more",
    "[data-action=\"load-more\"]",
    "button[aria-label*=\"more\" i]",
];

/// Extraction strategies, in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Api,
    AutomatedDom,
    StaticHtml,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => f.write_str("api"),
            Self::AutomatedDom => f.write_str("automated_dom"),
            Self::StaticHtml => f.write_str("static_html"),
        }
    }
}

/// How the next page of a paged listing is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    /// Single-page sources
    None,
    /// `?<name>=N`
    QueryParam(String),
    /// Trailing numeric path segment, or `/page/N`
    PathSegment,
    /// Increment an existing `page`/`p` parameter or path number, else add `?page=2`
    Auto,
}

/// A content-specific extraction plugin
#[async_trait]
pub trait SiteHandler: Send + Sync {
    /// Stable identifier used in logs, throttling and reports
    fn name(&self) -> &str;

    /// Higher wins when several handlers claim a URL
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn can_handle(&self, url: &Url) -> bool;

    fn prefers_api(&self) -> bool {
        false
    }

    /// Only the API strategy may run; its failure fails the pipeline
    fn requires_api(&self) -> bool {
        false
    }

    /// Authentication failure is fatal instead of a warning
    fn requires_auth(&self) -> bool {
        false
    }

    fn supports(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::Api => self.prefers_api() || self.requires_api(),
            Strategy::AutomatedDom | Strategy::StaticHtml => !self.requires_api(),
        }
    }

    /// Domains whose media is trusted even though they differ from the page's
    fn trusted_domains(&self) -> &[String] {
        &[]
    }

    fn is_cdn_host(&self, host: &str) -> bool {
        default_is_cdn_host(host)
    }

    /// Path-segment renames that turn a thumbnail URL into the original
    fn size_substitutions(&self) -> &[(&str, &str)] {
        DEFAULT_SIZE_SUBSTITUTIONS
    }

    fn pagination(&self) -> Pagination {
        Pagination::Auto
    }

    /// Run scroll-to-load before automated DOM extraction
    fn scroll_to_load(&self) -> bool {
        true
    }

    fn load_more_selectors(&self) -> &[&str] {
        DEFAULT_LOAD_MORE_SELECTORS
    }

    fn classify(&self, _url: &Url) -> PageInfo {
        PageInfo::default()
    }

    /// Whether a discovered link is worth following
    fn is_content_link(&self, _url: &Url) -> bool {
        true
    }

    async fn extract_via_api(
        &self,
        _ctx: &ExtractionContext,
        _http: &HttpClient,
    ) -> ExtractResult<Vec<MediaItem>> {
        Ok(Vec::new())
    }

    /// Called after navigation and scroll-to-load on the target page
    async fn extract_via_automated_dom(
        &self,
        _session: &dyn BrowserSession,
        _ctx: &ExtractionContext,
    ) -> ExtractResult<Vec<MediaItem>> {
        Ok(Vec::new())
    }

    /// Called with the parsed HTML of the target page
    fn extract_via_static_html(
        &self,
        _document: &Html,
        _ctx: &ExtractionContext,
    ) -> ExtractResult<Vec<MediaItem>> {
        Ok(Vec::new())
    }

    /// Handler-specific cleanup before generic normalization
    fn post_process(&self, items: Vec<MediaItem>, _ctx: &ExtractionContext) -> Vec<MediaItem> {
        items
    }
}
