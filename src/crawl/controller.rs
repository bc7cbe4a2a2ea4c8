//! Breadth-first crawl of one seed: pagination, link following and retry
//!
//! Every page is added to the visited set when it is queued, so a URL is
//! processed at most once even when retries put it back on the queue. Each
//! distinct page is charged against the page budget on its first attempt,
//! whether or not it succeeds. The crawl stops cleanly on cancellation, the
//! run deadline, or a budget, always returns what it has accumulated, and
//! leaves a checkpoint when pages were still queued.

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use url::Url;

use super::crawl_types::{CrawlCheckpoint, CrawlQueue, FailureKind, StopReason};
use super::links::{links_from_html, select_links};
use super::pagination::next_page_url;
use super::visited::VisitedSet;
use crate::auth::AuthResult;
use crate::browser::{BrowserSession, with_navigation_timeout, with_operation_timeout};
use crate::config::ScrapeConfig;
use crate::errors::ExtractResult;
use crate::handlers::{SiteHandler, Strategy};
use crate::media::MediaItem;
use crate::pipeline::{ExtractionContext, ExtractionPipeline, RunLog};
use crate::run::RunGuard;
use crate::utils::canonical_media_url;

/// Crawl limits for one seed
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub max_depth: u8,
    pub max_pages: usize,
    pub max_items: Option<usize>,
    pub follow_links: bool,
    pub paginate: bool,
    pub max_retries: u8,
    pub user_agent: String,
}

impl CrawlSettings {
    #[must_use]
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            max_depth: config.max_depth(),
            max_pages: config.max_pages(),
            max_items: config.max_items(),
            follow_links: config.follow_links(),
            paginate: config.paginate(),
            max_retries: config.max_retries(),
            user_agent: config.user_agent().to_string(),
        }
    }
}

/// Everything one seed's crawl produced
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    pub items: Vec<MediaItem>,
    /// Pages whose extraction completed
    pub pages_visited: usize,
    /// Distinct pages charged against the page budget, failed ones included
    pub pages_attempted: usize,
    pub stop_reason: StopReason,
    /// Strategy that produced the first page's items
    pub strategy_used: Option<Strategy>,
    pub errors: Vec<String>,
    /// Set when pages were still queued at the stop
    pub checkpoint: Option<CrawlCheckpoint>,
}

impl CrawlOutcome {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            pages_visited: 0,
            pages_attempted: 0,
            stop_reason: StopReason::Completed,
            strategy_used: None,
            errors: Vec::new(),
            checkpoint: None,
        }
    }
}

/// Queue and visited set of one crawl
struct Frontier {
    seed: String,
    visited: VisitedSet,
    queue: VecDeque<CrawlQueue>,
}

/// Drives the extraction pipeline over a seed and the pages reachable from it
#[derive(Debug, Clone)]
pub struct CrawlController {
    pipeline: ExtractionPipeline,
    settings: CrawlSettings,
}

impl CrawlController {
    #[must_use]
    pub fn new(pipeline: ExtractionPipeline, settings: CrawlSettings) -> Self {
        Self { pipeline, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Crawl from `seed` with `handler`.
    ///
    /// Never fails: errors are recorded in the outcome and the stop reason
    /// says why the crawl ended.
    pub async fn crawl(
        &self,
        seed: &str,
        handler: &dyn SiteHandler,
        session: Option<&dyn BrowserSession>,
        auth: Option<&AuthResult>,
        guard: &RunGuard,
        log: &RunLog,
    ) -> CrawlOutcome {
        let mut visited = VisitedSet::new();
        visited.insert(seed);
        let frontier = Frontier {
            seed: seed.to_string(),
            visited,
            queue: VecDeque::from([CrawlQueue::seed(seed)]),
        };
        self.drive(frontier, handler, session, auth, guard, log).await
    }

    /// Continue a crawl from the checkpoint it stopped at.
    ///
    /// Pending entries get a fresh retry allowance and the budgets start
    /// over; pages in the checkpoint's visited list are never processed
    /// again.
    pub async fn resume(
        &self,
        checkpoint: &CrawlCheckpoint,
        handler: &dyn SiteHandler,
        session: Option<&dyn BrowserSession>,
        auth: Option<&AuthResult>,
        guard: &RunGuard,
        log: &RunLog,
    ) -> CrawlOutcome {
        log.info(
            "crawl",
            &checkpoint.seed,
            format!(
                "resuming with {} pending, {} visited",
                checkpoint.pending.len(),
                checkpoint.visited.len()
            ),
        );
        let frontier = Frontier {
            seed: checkpoint.seed.clone(),
            visited: VisitedSet::from_urls(&checkpoint.visited),
            queue: checkpoint
                .pending
                .iter()
                .map(|entry| CrawlQueue {
                    retry_count: 0,
                    ..entry.clone()
                })
                .collect(),
        };
        self.drive(frontier, handler, session, auth, guard, log).await
    }

    async fn drive(
        &self,
        frontier: Frontier,
        handler: &dyn SiteHandler,
        session: Option<&dyn BrowserSession>,
        auth: Option<&AuthResult>,
        guard: &RunGuard,
        log: &RunLog,
    ) -> CrawlOutcome {
        let Frontier {
            seed,
            mut visited,
            mut queue,
        } = frontier;
        let mut outcome = CrawlOutcome::new();
        let mut seen_media: HashSet<String> = HashSet::new();

        outcome.stop_reason = loop {
            let Some(entry) = queue.pop_front() else {
                break StopReason::Completed;
            };
            if let Err(e) = guard.check() {
                log.info("crawl", &entry.url, format!("stopping: {e}"));
                queue.push_front(entry);
                break StopReason::from_error(&e);
            }
            let remaining = self
                .settings
                .max_items
                .map(|max| max.saturating_sub(outcome.items.len()));
            if remaining == Some(0) {
                log.info("crawl", &entry.url, "item budget reached");
                queue.push_front(entry);
                break StopReason::ItemBudget;
            }
            // Retries were charged on their first attempt
            if entry.retry_count == 0 {
                if outcome.pages_attempted >= self.settings.max_pages {
                    log.info("crawl", &entry.url, "page budget reached");
                    queue.push_front(entry);
                    break StopReason::PageBudget;
                }
                outcome.pages_attempted += 1;
            }

            let page_info = Url::parse(&entry.url)
                .map(|u| handler.classify(&u))
                .unwrap_or_default();
            let mut ctx = ExtractionContext::new(entry.url.clone(), guard.clone(), log.clone())
                .with_page_info(page_info)
                .with_budget(remaining)
                .with_user_agent(self.settings.user_agent.clone());

            let report = match self.pipeline.run(handler, session, &mut ctx, auth).await {
                Ok(report) => report,
                Err(e) if e.is_stop() => {
                    queue.push_front(entry);
                    break StopReason::from_error(&e);
                }
                Err(e) => {
                    let kind = FailureKind::classify(&e);
                    if kind.is_retryable() && entry.retry_count < self.settings.max_retries {
                        let retry = entry.retried();
                        let delay = self.pipeline.http().throttle().retry_delay(retry.retry_count, kind);
                        log.warn(
                            "crawl",
                            &entry.url,
                            format!(
                                "{e}; retry {}/{} in {delay:?}",
                                retry.retry_count, self.settings.max_retries
                            ),
                        );
                        if let Err(stop) = guard.sleep(delay).await {
                            queue.push_front(retry);
                            break StopReason::from_error(&stop);
                        }
                        queue.push_front(retry);
                    } else {
                        log.error("crawl", &entry.url, format!("giving up: {e}"));
                        outcome.errors.push(format!("{}: {e}", entry.url));
                    }
                    continue;
                }
            };
            outcome.pages_visited += 1;

            if report.is_failed() {
                let error = report.error.clone().unwrap_or_else(|| "pipeline failed".to_string());
                outcome.errors.push(format!("{}: {error}", entry.url));
                if entry.depth == 0 && entry.page_index == 0 {
                    break StopReason::Failed;
                }
                continue;
            }
            if outcome.strategy_used.is_none() {
                outcome.strategy_used = report.strategy_used;
            }

            let mut new_items = 0usize;
            for item in report.items {
                if seen_media.insert(canonical_media_url(&item.url)) {
                    outcome.items.push(item);
                    new_items += 1;
                }
            }
            log.info(
                "crawl",
                &entry.url,
                format!("page {} yielded {new_items} new items", outcome.pages_visited),
            );

            if self.settings.paginate && entry.depth == 0 {
                if new_items == 0 {
                    if entry.page_index > 0 {
                        log.info("crawl", &entry.url, "no new items, pagination exhausted");
                    }
                } else if let Some(next) = next_page_url(&entry.url, &handler.pagination())
                    && visited.insert(&next)
                {
                    queue.push_back(CrawlQueue {
                        url: next,
                        depth: 0,
                        retry_count: 0,
                        page_index: entry.page_index + 1,
                    });
                }
            }

            if self.settings.follow_links && entry.depth < self.settings.max_depth {
                let links = match self
                    .discover_links(handler, session, &entry.url, report.page_loaded, guard)
                    .await
                {
                    Ok(links) => links,
                    Err(e) if e.is_stop() => break StopReason::from_error(&e),
                    Err(e) => {
                        log.warn("links", &entry.url, format!("link discovery failed: {e}"));
                        Vec::new()
                    }
                };
                let selected = select_links(&links, &entry.url, handler, &visited);
                log.debug(
                    "links",
                    &entry.url,
                    format!("found {} links, {} queued", links.len(), selected.len()),
                );
                for link in selected {
                    visited.insert(&link);
                    queue.push_back(CrawlQueue {
                        url: link,
                        depth: entry.depth + 1,
                        retry_count: 0,
                        page_index: 0,
                    });
                }
            }
        };

        if let Some(max) = self.settings.max_items {
            outcome.items.truncate(max);
        }
        if !queue.is_empty() {
            outcome.checkpoint = Some(CrawlCheckpoint {
                seed: seed.clone(),
                visited: visited.to_sorted_vec(),
                pending: queue.into_iter().collect(),
            });
        }
        log.info(
            "crawl",
            &seed,
            format!(
                "finished ({:?}): {} pages, {} attempted, {} items",
                outcome.stop_reason,
                outcome.pages_visited,
                outcome.pages_attempted,
                outcome.items.len()
            ),
        );
        outcome
    }

    /// Links on `url`, from the browser when available, otherwise from the
    /// fetched HTML
    async fn discover_links(
        &self,
        handler: &dyn SiteHandler,
        session: Option<&dyn BrowserSession>,
        url: &str,
        page_loaded: bool,
        guard: &RunGuard,
    ) -> ExtractResult<Vec<String>> {
        let http = self.pipeline.http().scoped(handler.name(), guard);
        match session {
            Some(session) => {
                if !page_loaded {
                    http.throttle().acquire(handler.name(), url, guard).await?;
                    let timeout = guard.cap(self.pipeline.navigation_timeout());
                    with_navigation_timeout(session.navigate(url, timeout), timeout, url).await?;
                }
                with_operation_timeout(
                    session.links(),
                    guard.cap(self.pipeline.navigation_timeout()),
                    "links",
                )
                .await
            }
            None => {
                let body = http.get_text(url).await?;
                Ok(links_from_html(&body, url))
            }
        }
    }
}
