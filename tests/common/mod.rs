//! Test utilities for the mediascrape test suite: a scripted browser session,
//! a scripted site handler and config/pipeline helpers.

use async_trait::async_trait;
use kodegen_tools_mediascrape::config::{ScrapeConfigBuilder, WithStartUrl};
use kodegen_tools_mediascrape::crawl::CrawlSettings;
use kodegen_tools_mediascrape::{
    BrowserSession, CancellationToken, CookieEntry, CrawlController, ExtractError,
    ExtractResult, ExtractionContext, ExtractionPipeline, HandlerThrottle, HttpClient, MediaItem,
    Pagination, RunGuard, ScrapeConfig, SessionFactory, SiteHandler, Strategy,
};
use mockito::{Mock, Server};
use parking_lot::Mutex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

// ---------------------------------------------------------------------------
// Config and pipeline helpers
// ---------------------------------------------------------------------------

/// Route engine logs to the test output; `RUST_LOG` selects the level
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builder with timeouts and delays small enough for tests
#[allow(dead_code)]
pub fn test_config(seed: &str) -> ScrapeConfigBuilder<WithStartUrl> {
    ScrapeConfig::builder()
        .start_url(seed)
        .request_delay_ms(0)
        .scrolling(3, 0)
        .stable_scroll_threshold(1)
        .probe_timeout_ms(50)
        .page_load_timeout_secs(2)
        .operation_timeout_secs(1)
        .run_timeout_secs(30)
        .verify_upgrades(false)
        .max_retries(1)
}

#[allow(dead_code)]
pub fn http_client(config: &ScrapeConfig) -> HttpClient {
    HttpClient::new(
        config.user_agent(),
        Arc::new(HandlerThrottle::new(config.request_delay())),
        config.max_retries(),
        Duration::from_secs(config.page_load_timeout_secs()),
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn pipeline(config: &ScrapeConfig) -> ExtractionPipeline {
    ExtractionPipeline::from_config(config, http_client(config))
}

#[allow(dead_code)]
pub fn crawler(config: &ScrapeConfig) -> CrawlController {
    CrawlController::new(pipeline(config), CrawlSettings::from_config(config))
}

/// Guard with no deadline and a fresh token
#[allow(dead_code)]
pub fn guard() -> RunGuard {
    RunGuard::unbounded(CancellationToken::new())
}

#[allow(dead_code)]
pub fn context(url: &str) -> ExtractionContext {
    ExtractionContext::new(url, guard(), Default::default())
}

/// `count` image items under `https://example.com/media/`
#[allow(dead_code)]
pub fn items(prefix: &str, count: usize) -> Vec<MediaItem> {
    (0..count)
        .map(|i| MediaItem::from_url(format!("https://example.com/media/{prefix}-{i}.jpg")))
        .collect()
}

/// Creates a mock endpoint serving `html`
#[allow(dead_code)]
pub async fn create_html_mock(server: &mut Server, path: &str, html: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(html)
        .create_async()
        .await
}

/// Minimal HTML page with the given title and body
#[allow(dead_code)]
pub fn create_test_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body>
    {body}
</body>
</html>"#
    )
}

// ---------------------------------------------------------------------------
// Scripted browser session
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionScript {
    visible: HashSet<String>,
    /// (cookie name, selector): selector is visible once the cookie is set
    visible_with_cookie: Option<(String, String)>,
    /// (clicked selector, selector): selector is visible after the click
    visible_after_click: Option<(String, String)>,
    hang_probes: bool,
    hang_cookie_reads: bool,
    hang_cookie_writes: bool,
    pages: HashMap<String, String>,
    links: HashMap<String, Vec<String>>,
    nav_failures: HashMap<String, usize>,
    heights: Vec<u64>,
    meta: serde_json::Value,
}

#[derive(Default)]
pub struct SessionState {
    pub current_url: String,
    pub navigations: Vec<String>,
    pub cookies: Vec<CookieEntry>,
    pub fills: Vec<(String, String)>,
    pub clicks: Vec<String>,
    pub scrolls: usize,
    pub closed: bool,
}

/// In-memory [`BrowserSession`] driven by a script
///
/// Clones share both script and state; [`MockSession::fresh`] shares the
/// script only.
#[derive(Clone, Default)]
pub struct MockSession {
    script: Arc<Mutex<SessionScript>>,
    state: Arc<Mutex<SessionState>>,
}

#[allow(dead_code)]
impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same script, new state
    pub fn fresh(&self) -> Self {
        Self {
            script: self.script.clone(),
            state: Arc::default(),
        }
    }

    pub fn with_visible(self, selector: &str) -> Self {
        self.script.lock().visible.insert(selector.to_string());
        self
    }

    pub fn with_logged_in_cookie(self, cookie: &str, selector: &str) -> Self {
        self.script.lock().visible_with_cookie = Some((cookie.to_string(), selector.to_string()));
        self
    }

    pub fn with_login_on_click(self, clicked: &str, selector: &str) -> Self {
        self.script.lock().visible_after_click = Some((clicked.to_string(), selector.to_string()));
        self
    }

    /// Every visibility check hangs until the caller's timeout fires
    pub fn with_hanging_probes(self) -> Self {
        self.script.lock().hang_probes = true;
        self
    }

    /// Reading cookies hangs until the caller's timeout fires
    pub fn with_hanging_cookie_reads(self) -> Self {
        self.script.lock().hang_cookie_reads = true;
        self
    }

    /// Setting cookies hangs until the caller's timeout fires
    pub fn with_hanging_cookie_writes(self) -> Self {
        self.script.lock().hang_cookie_writes = true;
        self
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.script.lock().pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_links(self, url: &str, links: &[&str]) -> Self {
        self.script
            .lock()
            .links
            .insert(url.to_string(), links.iter().map(|l| (*l).to_string()).collect());
        self
    }

    /// The first `times` navigations to `url` time out
    pub fn with_navigation_failures(self, url: &str, times: usize) -> Self {
        self.script.lock().nav_failures.insert(url.to_string(), times);
        self
    }

    /// Heights reported by successive `scroll_height` calls; the last repeats
    pub fn with_heights(self, heights: &[u64]) -> Self {
        self.script.lock().heights = heights.to_vec();
        self
    }

    pub fn with_meta(self, meta: serde_json::Value) -> Self {
        self.script.lock().meta = meta;
        self
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> ExtractResult<()> {
        self.state.lock().navigations.push(url.to_string());
        {
            let mut script = self.script.lock();
            if let Some(left) = script.nav_failures.get_mut(url)
                && *left > 0
            {
                *left -= 1;
                return Err(ExtractError::NavigationTimeout {
                    url: url.to_string(),
                    secs: timeout.as_secs(),
                });
            }
        }
        self.state.lock().current_url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> ExtractResult<String> {
        Ok(self.state.lock().current_url.clone())
    }

    async fn content(&self) -> ExtractResult<String> {
        let current = self.state.lock().current_url.clone();
        Ok(self
            .script
            .lock()
            .pages
            .get(&current)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    async fn evaluate(&self, _script: &str) -> ExtractResult<serde_json::Value> {
        Ok(self.script.lock().meta.clone())
    }

    async fn set_cookies(&self, cookies: &[CookieEntry]) -> ExtractResult<()> {
        let hang = self.script.lock().hang_cookie_writes;
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.state.lock().cookies.extend_from_slice(cookies);
        Ok(())
    }

    async fn cookies(&self) -> ExtractResult<Vec<CookieEntry>> {
        let hang = self.script.lock().hang_cookie_reads;
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self.state.lock().cookies.clone())
    }

    async fn is_visible(&self, selector: &str) -> ExtractResult<bool> {
        let hang = self.script.lock().hang_probes;
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Ok(false);
        }
        let script = self.script.lock();
        let state = self.state.lock();
        if script.visible.contains(selector) {
            return Ok(true);
        }
        if let Some((cookie, shown)) = &script.visible_with_cookie
            && shown == selector
            && state.cookies.iter().any(|c| &c.name == cookie)
        {
            return Ok(true);
        }
        if let Some((clicked, shown)) = &script.visible_after_click
            && shown == selector
            && state.clicks.iter().any(|c| c == clicked)
        {
            return Ok(true);
        }
        Ok(false)
    }

    async fn fill(&self, selector: &str, value: &str) -> ExtractResult<()> {
        self.state.lock().fills.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str) -> ExtractResult<()> {
        self.state.lock().clicks.push(selector.to_string());
        Ok(())
    }

    async fn count(&self, _selector: &str) -> ExtractResult<usize> {
        Ok(0)
    }

    async fn scroll_height(&self) -> ExtractResult<u64> {
        let scrolls = self.state.lock().scrolls;
        let script = self.script.lock();
        Ok(match script.heights.as_slice() {
            [] => 1000,
            heights => heights[scrolls.min(heights.len() - 1)],
        })
    }

    async fn scroll_to_bottom(&self) -> ExtractResult<()> {
        self.state.lock().scrolls += 1;
        Ok(())
    }

    async fn links(&self) -> ExtractResult<Vec<String>> {
        let current = self.state.lock().current_url.clone();
        Ok(self.script.lock().links.get(&current).cloned().unwrap_or_default())
    }

    async fn close(&self) -> ExtractResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

/// Hands out fresh [`MockSession`]s sharing one script
#[derive(Default)]
pub struct MockSessionFactory {
    prototype: MockSession,
    pub opened: Mutex<Vec<MockSession>>,
    pub shutdowns: AtomicUsize,
}

#[allow(dead_code)]
impl MockSessionFactory {
    pub fn new(prototype: MockSession) -> Self {
        Self {
            prototype,
            opened: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn sessions(&self) -> Vec<MockSession> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn open_session(&self) -> ExtractResult<Box<dyn BrowserSession>> {
        let session = self.prototype.fresh();
        self.opened.lock().push(session.clone());
        Ok(Box::new(session))
    }

    async fn shutdown(&self) -> ExtractResult<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted site handler
// ---------------------------------------------------------------------------

/// What one strategy of a [`ScriptedHandler`] does when called
pub enum Behavior {
    /// The same items on every call
    Items(Vec<MediaItem>),
    /// One batch per call, then nothing
    Sequence(Mutex<VecDeque<Vec<MediaItem>>>),
    /// Items keyed by target URL
    PerPage(HashMap<String, Vec<MediaItem>>),
    /// Every `img[src]` of the parsed document (static HTML only)
    DocumentImages,
    Empty,
    /// A non-aborting strategy error
    Fail(String),
    /// An aborting operation timeout
    Timeout,
}

#[allow(dead_code)]
impl Behavior {
    pub fn sequence(batches: Vec<Vec<MediaItem>>) -> Self {
        Self::Sequence(Mutex::new(batches.into()))
    }

    pub fn per_page(pages: Vec<(&str, Vec<MediaItem>)>) -> Self {
        Self::PerPage(pages.into_iter().map(|(u, i)| (u.to_string(), i)).collect())
    }

    fn produce(&self, url: &str, document: Option<&Html>) -> ExtractResult<Vec<MediaItem>> {
        match self {
            Self::Items(items) => Ok(items.clone()),
            Self::Sequence(batches) => Ok(batches.lock().pop_front().unwrap_or_default()),
            Self::PerPage(pages) => Ok(pages.get(url).cloned().unwrap_or_default()),
            Self::DocumentImages => {
                let Some(document) = document else {
                    return Ok(Vec::new());
                };
                let img = Selector::parse("img[src]").unwrap();
                Ok(document
                    .select(&img)
                    .filter_map(|el| el.value().attr("src"))
                    .map(MediaItem::from_url)
                    .collect())
            }
            Self::Empty => Ok(Vec::new()),
            Self::Fail(message) => Err(ExtractError::StrategyError {
                strategy: "scripted".to_string(),
                message: message.clone(),
            }),
            Self::Timeout => Err(ExtractError::OperationTimeout {
                operation: "scripted".to_string(),
                millis: 1,
            }),
        }
    }
}

/// [`SiteHandler`] whose strategies follow [`Behavior`] scripts and which
/// records every call it receives
pub struct ScriptedHandler {
    name: String,
    domain: String,
    priority: i32,
    prefers_api: bool,
    requires_api: bool,
    requires_auth: bool,
    scroll: bool,
    pagination: Pagination,
    trusted: Vec<String>,
    api: Behavior,
    dom: Behavior,
    html: Behavior,
    delay: Duration,
    cancel_after: Option<(usize, CancellationToken)>,
    pub calls: Mutex<Vec<(Strategy, String)>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedHandler {
    /// Handler for `domain` and its subdomains; `"*"` claims every URL
    pub fn new(name: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            domain: domain.to_string(),
            priority: 100,
            prefers_api: false,
            requires_api: false,
            requires_auth: false,
            scroll: false,
            pagination: Pagination::None,
            trusted: Vec::new(),
            api: Behavior::Empty,
            dom: Behavior::Empty,
            html: Behavior::Empty,
            delay: Duration::ZERO,
            cancel_after: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn api(mut self, behavior: Behavior) -> Self {
        self.prefers_api = true;
        self.api = behavior;
        self
    }

    pub fn api_only(mut self, behavior: Behavior) -> Self {
        self.requires_api = true;
        self.api = behavior;
        self
    }

    pub fn dom(mut self, behavior: Behavior) -> Self {
        self.dom = behavior;
        self
    }

    pub fn html(mut self, behavior: Behavior) -> Self {
        self.html = behavior;
        self
    }

    pub fn requiring_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn scrolling(mut self) -> Self {
        self.scroll = true;
        self
    }

    pub fn paginated(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn trusting(mut self, domain: &str) -> Self {
        self.trusted.push(domain.to_string());
        self
    }

    /// Each DOM/API call takes at least `delay`
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cancel `token` on the `n`th extraction call (1-based)
    pub fn cancelling_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn calls(&self) -> Vec<(Strategy, String)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, strategy: Strategy) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(s, _)| *s == strategy)
            .map(|(_, url)| url.clone())
            .collect()
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, strategy: Strategy, url: &str) {
        let total = {
            let mut calls = self.calls.lock();
            calls.push((strategy, url.to_string()));
            calls.len()
        };
        if let Some((n, token)) = &self.cancel_after
            && total >= *n
        {
            token.cancel();
        }
    }

    async fn pace(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SiteHandler for ScriptedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_handle(&self, url: &Url) -> bool {
        if self.domain == "*" {
            return true;
        }
        url.host_str().is_some_and(|host| {
            host == self.domain || host.ends_with(&format!(".{}", self.domain))
        })
    }

    fn prefers_api(&self) -> bool {
        self.prefers_api
    }

    fn requires_api(&self) -> bool {
        self.requires_api
    }

    fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    fn trusted_domains(&self) -> &[String] {
        &self.trusted
    }

    fn pagination(&self) -> Pagination {
        self.pagination.clone()
    }

    fn scroll_to_load(&self) -> bool {
        self.scroll
    }

    async fn extract_via_api(
        &self,
        ctx: &ExtractionContext,
        _http: &HttpClient,
    ) -> ExtractResult<Vec<MediaItem>> {
        self.record(Strategy::Api, &ctx.target_url);
        self.pace().await;
        self.api.produce(&ctx.target_url, None)
    }

    async fn extract_via_automated_dom(
        &self,
        _session: &dyn BrowserSession,
        ctx: &ExtractionContext,
    ) -> ExtractResult<Vec<MediaItem>> {
        self.record(Strategy::AutomatedDom, &ctx.target_url);
        self.pace().await;
        self.dom.produce(&ctx.target_url, None)
    }

    fn extract_via_static_html(
        &self,
        document: &Html,
        ctx: &ExtractionContext,
    ) -> ExtractResult<Vec<MediaItem>> {
        self.record(Strategy::StaticHtml, &ctx.target_url);
        self.html.produce(&ctx.target_url, Some(document))
    }
}
