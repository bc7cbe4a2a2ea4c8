//! Scroll-to-load for lazily rendered galleries
//!
//! Scrolls to the bottom until the document height and media count stop
//! changing for `stable_threshold` consecutive steps. When the page stalls,
//! the handler's load-more controls get one click before giving up.

use std::time::Duration;

use crate::browser::{BrowserSession, with_operation_timeout};
use crate::errors::ExtractResult;
use crate::handlers::SiteHandler;
use crate::pipeline::RunLog;
use crate::run::RunGuard;

const MEDIA_COUNT_SELECTOR: &str = "img, video, audio, picture";

/// Bounds for one scroll-to-load pass
#[derive(Debug, Clone, Copy)]
pub struct ScrollSettings {
    pub max_scrolls: usize,
    pub delay: Duration,
    pub stable_threshold: usize,
    pub operation_timeout: Duration,
}

/// What a scroll pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub scrolls: usize,
    pub load_more_clicks: usize,
    pub final_height: u64,
}

/// Snapshot used to detect growth between scroll steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageExtent {
    height: u64,
    media: usize,
}

async fn measure(session: &dyn BrowserSession, timeout: Duration) -> ExtractResult<PageExtent> {
    let height = with_operation_timeout(session.scroll_height(), timeout, "scroll_height").await?;
    let media = with_operation_timeout(session.count(MEDIA_COUNT_SELECTOR), timeout, "count_media")
        .await?;
    Ok(PageExtent { height, media })
}

/// Click the first visible load-more control. Returns whether one was clicked.
async fn click_load_more(
    session: &dyn BrowserSession,
    handler: &dyn SiteHandler,
    timeout: Duration,
) -> ExtractResult<bool> {
    for selector in handler.load_more_selectors() {
        let visible = with_operation_timeout(session.is_visible(selector), timeout, "probe_load_more")
            .await
            .unwrap_or(false);
        if visible {
            with_operation_timeout(session.click(selector), timeout, "click_load_more").await?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Scroll the current page until it stops growing.
///
/// Only cancellation and deadline expiry are returned as errors; a failing
/// browser call ends the pass early and keeps whatever has loaded.
pub async fn scroll_to_load(
    session: &dyn BrowserSession,
    handler: &dyn SiteHandler,
    settings: &ScrollSettings,
    guard: &RunGuard,
    log: &RunLog,
    url: &str,
) -> ExtractResult<ScrollOutcome> {
    let timeout = settings.operation_timeout;
    let mut outcome = ScrollOutcome::default();

    let mut last = match measure(session, timeout).await {
        Ok(extent) => extent,
        Err(e) => {
            log.warn("scroll", url, format!("cannot measure page: {e}"));
            return Ok(outcome);
        }
    };
    outcome.final_height = last.height;
    let mut stable = 0usize;

    while outcome.scrolls < settings.max_scrolls {
        guard.check()?;

        if let Err(e) = with_operation_timeout(session.scroll_to_bottom(), timeout, "scroll").await {
            log.warn("scroll", url, format!("scroll step failed: {e}"));
            break;
        }
        outcome.scrolls += 1;
        guard.sleep(settings.delay).await?;

        let current = match measure(session, timeout).await {
            Ok(extent) => extent,
            Err(e) => {
                log.warn("scroll", url, format!("cannot measure page: {e}"));
                break;
            }
        };
        outcome.final_height = current.height;

        if current == last {
            stable += 1;
            if stable >= settings.stable_threshold {
                match click_load_more(session, handler, timeout).await {
                    Ok(true) => {
                        outcome.load_more_clicks += 1;
                        log.debug("scroll", url, "clicked load-more control");
                        stable = 0;
                        guard.sleep(settings.delay).await?;
                        continue;
                    }
                    Ok(false) => break,
                    Err(e) => {
                        log.warn("scroll", url, format!("load-more click failed: {e}"));
                        break;
                    }
                }
            }
        } else {
            stable = 0;
            last = current;
        }
    }

    log.debug(
        "scroll",
        url,
        format!(
            "{} scrolls, {} load-more clicks, final height {}",
            outcome.scrolls, outcome.load_more_clicks, outcome.final_height
        ),
    );
    Ok(outcome)
}
