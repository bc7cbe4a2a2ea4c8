//! Browser automation capability
//!
//! The engine drives pages only through [`BrowserSession`]; the chromiumoxide
//! implementation lives in [`chromium`]. Each worker owns one session, so a
//! session is never shared across concurrent pipelines.

pub mod chromium;
pub mod setup;
pub mod timeout;

use async_trait::async_trait;
use std::time::Duration;

use crate::auth::CookieEntry;
use crate::errors::ExtractResult;

pub use chromium::{ChromiumSession, ChromiumSessionFactory};
pub use timeout::{with_navigation_timeout, with_operation_timeout};

/// One isolated browser tab with its own cookie jar
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate and wait for the load event, bounded by `timeout`.
    ///
    /// Implementations return `ExtractError::NavigationTimeout` when the bound
    /// is exceeded.
    async fn navigate(&self, url: &str, timeout: Duration) -> ExtractResult<()>;

    async fn current_url(&self) -> ExtractResult<String>;

    /// Serialized DOM of the current document
    async fn content(&self) -> ExtractResult<String>;

    /// Evaluate a script expression and return its JSON value (`Null` for
    /// `undefined`).
    async fn evaluate(&self, script: &str) -> ExtractResult<serde_json::Value>;

    async fn set_cookies(&self, cookies: &[CookieEntry]) -> ExtractResult<()>;

    async fn cookies(&self) -> ExtractResult<Vec<CookieEntry>>;

    /// Whether an element matching `selector` exists and is rendered
    async fn is_visible(&self, selector: &str) -> ExtractResult<bool>;

    /// Clear the first element matching `selector` and type `value` into it
    async fn fill(&self, selector: &str, value: &str) -> ExtractResult<()>;

    async fn click(&self, selector: &str) -> ExtractResult<()>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> ExtractResult<usize>;

    /// Current `document.body.scrollHeight`
    async fn scroll_height(&self) -> ExtractResult<u64>;

    async fn scroll_to_bottom(&self) -> ExtractResult<()>;

    /// Absolute `href` targets of all anchors on the current document
    async fn links(&self) -> ExtractResult<Vec<String>>;

    async fn close(&self) -> ExtractResult<()>;
}

/// Opens isolated sessions for workers
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open_session(&self) -> ExtractResult<Box<dyn BrowserSession>>;

    /// Release shared resources once every session is closed
    async fn shutdown(&self) -> ExtractResult<()> {
        Ok(())
    }
}
