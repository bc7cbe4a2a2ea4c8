//! Strategy fallback state machine
//!
//! ```text
//! Init → Auth → Api → AutomatedDom → StaticHtml → Normalize → Done
//!          ↘       ↘ (requires_api)                          ↘
//!           Failed   Failed                                   Failed
//! ```
//!
//! The first strategy yielding at least one item wins. Strategy errors are
//! logged and treated as an empty result, except cancellation, deadline
//! expiry and timeouts, which abort the pipeline and are returned as `Err`.

use scraper::Html;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::context::{ExtractionContext, PageMeta};
use super::http::HttpClient;
use super::filter::MediaFilter;
use super::normalize::Normalizer;
use super::upgrade::ResolutionUpgrader;
use crate::auth::AuthResult;
use crate::browser::{BrowserSession, with_navigation_timeout, with_operation_timeout};
use crate::config::ScrapeConfig;
use crate::crawl::{ScrollSettings, scroll_to_load};
use crate::errors::{ExtractError, ExtractResult};
use crate::handlers::js_scripts::PAGE_META_SCRIPT;
use crate::handlers::{SiteHandler, Strategy, page_meta_from_html};
use crate::media::MediaItem;

/// Pipeline states; `Done` and `Failed` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    Auth,
    Api,
    AutomatedDom,
    StaticHtml,
    Normalize,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Auth => "auth",
            Self::Api => "api",
            Self::AutomatedDom => "automated_dom",
            Self::StaticHtml => "static_html",
            Self::Normalize => "normalize",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of one strategy attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Items { count: usize },
    Empty,
    Error { kind: String, message: String },
    /// Not supported by the handler or no browser session available
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// What one pipeline invocation produced
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub items: Vec<MediaItem>,
    pub strategy_used: Option<Strategy>,
    pub attempts: Vec<StrategyAttempt>,
    /// The browser session was navigated to the target
    pub page_loaded: bool,
    pub error: Option<String>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            state: PipelineState::Init,
            items: Vec::new(),
            strategy_used: None,
            attempts: Vec::new(),
            page_loaded: false,
            error: None,
        }
    }

    fn fail(mut self, error: &ExtractError) -> Self {
        self.state = PipelineState::Failed;
        self.error = Some(error.to_string());
        self
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == PipelineState::Failed
    }
}

/// Runs one handler against one target URL
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    http: HttpClient,
    normalizer: Normalizer,
    navigation_timeout: Duration,
    operation_timeout: Duration,
    scroll: ScrollSettings,
}

impl ExtractionPipeline {
    #[must_use]
    pub fn new(
        http: HttpClient,
        normalizer: Normalizer,
        navigation_timeout: Duration,
        operation_timeout: Duration,
        scroll: ScrollSettings,
    ) -> Self {
        Self {
            http,
            normalizer,
            navigation_timeout,
            operation_timeout,
            scroll,
        }
    }

    /// Pipeline with timeouts, scrolling and normalization taken from `config`
    #[must_use]
    pub fn from_config(config: &ScrapeConfig, http: HttpClient) -> Self {
        let upgrader = ResolutionUpgrader::new(
            config.upgrade_target_px(),
            config.verify_upgrades(),
            config.probe_timeout(),
        );
        Self::new(
            http,
            Normalizer::new(upgrader, config.same_domain_only())
                .with_filter(MediaFilter::from_config(config)),
            Duration::from_secs(config.page_load_timeout_secs()),
            config.operation_timeout(),
            ScrollSettings {
                max_scrolls: config.max_scrolls(),
                delay: config.scroll_delay(),
                stable_threshold: config.stable_scroll_threshold(),
                operation_timeout: config.operation_timeout(),
            },
        )
    }

    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    /// Drive `handler` through the strategy chain for `ctx.target_url`.
    ///
    /// `auth` is the outcome of the session's authentication, if any was
    /// attempted. `Err` is only returned for aborting errors.
    pub async fn run(
        &self,
        handler: &dyn SiteHandler,
        session: Option<&dyn BrowserSession>,
        ctx: &mut ExtractionContext,
        auth: Option<&AuthResult>,
    ) -> ExtractResult<PipelineReport> {
        let url = ctx.target_url.clone();
        let log = ctx.log.clone();
        let mut report = PipelineReport::new();
        log.debug("pipeline", &url, format!("handler '{}' starting", handler.name()));
        ctx.guard.check()?;

        report.state = PipelineState::Auth;
        if handler.requires_auth() && !auth.is_some_and(|a| a.success) {
            let error = ExtractError::AuthenticationFailed {
                domain: crate::utils::host_of(&url).unwrap_or_default(),
                reason: format!("handler '{}' requires an authenticated session", handler.name()),
            };
            log.error("pipeline", &url, error.to_string());
            return Ok(report.fail(&error));
        }

        let http = self.http.scoped(handler.name(), &ctx.guard);
        let mut found: Option<(Strategy, Vec<MediaItem>)> = None;

        // API
        report.state = PipelineState::Api;
        if handler.supports(Strategy::Api) {
            ctx.guard.check()?;
            let result = handler.extract_via_api(ctx, &http).await;
            match self.settle(Strategy::Api, result, &mut report, ctx)? {
                Some(items) => found = Some((Strategy::Api, items)),
                None if handler.requires_api() => {
                    let reason = report
                        .attempts
                        .last()
                        .map_or_else(|| "no items".to_string(), |a| match &a.outcome {
                            AttemptOutcome::Error { message, .. } => message.clone(),
                            _ => "API returned no items".to_string(),
                        });
                    let error = ExtractError::ApiRequired {
                        handler: handler.name().to_string(),
                        reason,
                    };
                    log.error("pipeline", &url, error.to_string());
                    return Ok(report.fail(&error));
                }
                None => {}
            }
        } else {
            report.attempts.push(skipped(Strategy::Api));
        }

        // Automated DOM
        if found.is_none() {
            report.state = PipelineState::AutomatedDom;
            match session {
                Some(session) if handler.supports(Strategy::AutomatedDom) => {
                    ctx.guard.check()?;
                    let result = self.run_dom(handler, session, ctx, &mut report).await;
                    if let Some(items) = self.settle(Strategy::AutomatedDom, result, &mut report, ctx)? {
                        found = Some((Strategy::AutomatedDom, items));
                    }
                }
                _ => report.attempts.push(skipped(Strategy::AutomatedDom)),
            }
        }

        // Static HTML
        if found.is_none() {
            report.state = PipelineState::StaticHtml;
            if handler.supports(Strategy::StaticHtml) {
                ctx.guard.check()?;
                let result = self.run_static(handler, session, ctx, &http, report.page_loaded).await;
                if let Some(items) = self.settle(Strategy::StaticHtml, result, &mut report, ctx)? {
                    found = Some((Strategy::StaticHtml, items));
                }
            } else {
                report.attempts.push(skipped(Strategy::StaticHtml));
            }
        }

        report.state = PipelineState::Normalize;
        if let Some((strategy, items)) = found {
            report.strategy_used = Some(strategy);
            report.items = self.normalizer.normalize(items, handler, ctx, &http).await;
            log.info(
                "pipeline",
                &url,
                format!("{} items via {strategy} after normalization", report.items.len()),
            );
        } else {
            log.warn("pipeline", &url, "no strategy produced items");
        }

        report.state = PipelineState::Done;
        Ok(report)
    }

    /// Record an attempt; abort errors are returned, others become `None`
    fn settle(
        &self,
        strategy: Strategy,
        result: ExtractResult<Vec<MediaItem>>,
        report: &mut PipelineReport,
        ctx: &ExtractionContext,
    ) -> ExtractResult<Option<Vec<MediaItem>>> {
        let url = ctx.target_url.as_str();
        match result {
            Ok(items) if !items.is_empty() => {
                ctx.log.info("strategy", url, format!("{strategy} returned {} items", items.len()));
                report.attempts.push(StrategyAttempt {
                    strategy,
                    outcome: AttemptOutcome::Items { count: items.len() },
                });
                Ok(Some(items))
            }
            Ok(_) => {
                ctx.log.info("strategy", url, format!("{strategy} returned no items"));
                report.attempts.push(StrategyAttempt {
                    strategy,
                    outcome: AttemptOutcome::Empty,
                });
                Ok(None)
            }
            Err(e) => {
                report.attempts.push(StrategyAttempt {
                    strategy,
                    outcome: AttemptOutcome::Error {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    },
                });
                if e.is_abort() {
                    ctx.log.error("strategy", url, format!("{strategy} aborted: {e}"));
                    return Err(e);
                }
                ctx.log.warn("strategy", url, format!("{strategy} failed: {e}"));
                Ok(None)
            }
        }
    }

    async fn run_dom(
        &self,
        handler: &dyn SiteHandler,
        session: &dyn BrowserSession,
        ctx: &mut ExtractionContext,
        report: &mut PipelineReport,
    ) -> ExtractResult<Vec<MediaItem>> {
        let url = ctx.target_url.clone();
        self.http.throttle().acquire(handler.name(), &url, &ctx.guard).await?;
        let nav_timeout = ctx.guard.cap(self.navigation_timeout);
        with_navigation_timeout(session.navigate(&url, nav_timeout), nav_timeout, &url).await?;
        report.page_loaded = true;

        if handler.scroll_to_load() {
            scroll_to_load(session, handler, &self.scroll, &ctx.guard, &ctx.log, &url).await?;
        }

        match with_operation_timeout(
            session.evaluate(PAGE_META_SCRIPT),
            ctx.guard.cap(self.operation_timeout),
            "page_meta",
        )
        .await
        {
            Ok(value) => {
                if let Ok(meta) = serde_json::from_value::<PageMeta>(value) {
                    ctx.page_meta = meta;
                }
            }
            Err(e) if e.is_stop() => return Err(e),
            Err(e) => ctx.log.debug("pipeline", &url, format!("page metadata unavailable: {e}")),
        }

        let bound = ctx.guard.cap(self.navigation_timeout);
        with_operation_timeout(
            handler.extract_via_automated_dom(session, ctx),
            bound,
            "extract_via_automated_dom",
        )
        .await
    }

    async fn run_static(
        &self,
        handler: &dyn SiteHandler,
        session: Option<&dyn BrowserSession>,
        ctx: &mut ExtractionContext,
        http: &HttpClient,
        page_loaded: bool,
    ) -> ExtractResult<Vec<MediaItem>> {
        let body = match session {
            Some(session) if page_loaded => {
                with_operation_timeout(
                    session.content(),
                    ctx.guard.cap(self.operation_timeout),
                    "page_content",
                )
                .await?
            }
            _ => http.get_text(&ctx.target_url).await?,
        };

        let document = Html::parse_document(&body);
        if ctx.page_meta == PageMeta::default() {
            ctx.page_meta = page_meta_from_html(&document);
        }
        handler.extract_via_static_html(&document, ctx)
    }
}

fn skipped(strategy: Strategy) -> StrategyAttempt {
    StrategyAttempt {
        strategy,
        outcome: AttemptOutcome::Skipped,
    }
}
