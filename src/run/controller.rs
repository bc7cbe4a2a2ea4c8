//! Top-level orchestration of a run
//!
//! Each start URL is processed by one worker with its own browser session:
//! resolve a handler, authenticate, crawl. At most `max_concurrent_runs`
//! workers run at once. Results are merged in start-URL order and
//! deduplicated by canonical URL.
//!
//! A run can resume from the report of an earlier, interrupted run: seeds
//! that finished are carried over, seeds that stopped early continue from
//! their checkpoint, and the earlier items stay in front of the new ones.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::cancellation::{CancellationToken, RunGuard};
use super::report::{RunReport, SeedReport};
use crate::auth::{AuthResult, Credential, CredentialStore, SessionAuthenticator, SessionStore};
use crate::browser::{BrowserSession, SessionFactory};
use crate::config::ScrapeConfig;
use crate::crawl::{CrawlCheckpoint, CrawlController, CrawlSettings, HandlerThrottle, StopReason};
use crate::dedup::UrlDeduplicator;
use crate::errors::ExtractResult;
use crate::handlers::{HandlerRegistry, SiteHandler, Strategy};
use crate::media::MediaItem;
use crate::pipeline::{ExtractionPipeline, HttpClient, RunLog};

/// State shared by every worker of a run
#[derive(Clone)]
struct SeedWorker {
    registry: Arc<HandlerRegistry>,
    credentials: Arc<CredentialStore>,
    authenticator: Arc<SessionAuthenticator>,
    factory: Arc<dyn SessionFactory>,
    crawler: Arc<CrawlController>,
}

/// Runs every start URL of a [`ScrapeConfig`] to completion
pub struct RunController {
    config: Arc<ScrapeConfig>,
    worker: SeedWorker,
    token: CancellationToken,
    previous: Option<RunReport>,
}

impl RunController {
    /// Build a controller from `config`.
    ///
    /// Loads the credentials document and session store the config points
    /// at, if any.
    pub fn new(
        config: ScrapeConfig,
        registry: HandlerRegistry,
        factory: Arc<dyn SessionFactory>,
    ) -> ExtractResult<Self> {
        let credentials = match config.credentials_path() {
            Some(path) => CredentialStore::from_file(path)?,
            None => CredentialStore::empty(),
        };

        let mut authenticator = SessionAuthenticator::new(
            config.probe_timeout(),
            config.operation_timeout(),
            Duration::from_secs(config.page_load_timeout_secs()),
        );
        if let Some(dir) = config.session_dir() {
            authenticator =
                authenticator.with_session_store(SessionStore::new(dir, config.session_expiry_hours()));
        }

        let throttle = Arc::new(HandlerThrottle::new(config.request_delay()));
        let http = HttpClient::new(
            config.user_agent(),
            throttle,
            config.max_retries(),
            Duration::from_secs(config.page_load_timeout_secs()),
        )?;
        let pipeline = ExtractionPipeline::from_config(&config, http);
        let crawler = CrawlController::new(pipeline, CrawlSettings::from_config(&config));

        Ok(Self {
            config: Arc::new(config),
            worker: SeedWorker {
                registry: Arc::new(registry),
                credentials: Arc::new(credentials),
                authenticator: Arc::new(authenticator),
                factory,
                crawler: Arc::new(crawler),
            },
            token: CancellationToken::new(),
            previous: None,
        })
    }

    /// Replace the credentials loaded from the config
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.worker.credentials = Arc::new(credentials);
        self
    }

    /// Continue the run that produced `previous` instead of starting over
    #[must_use]
    pub fn resume_from(mut self, previous: RunReport) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Token that stops this controller's runs when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request a cooperative stop; `run` returns partial results
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Process every start URL and merge the results.
    ///
    /// Cancellation and the run deadline end the run early but still return
    /// everything collected so far.
    pub async fn run(&self) -> RunReport {
        let guard = RunGuard::new(self.token.clone(), self.config.run_timeout());
        let log = RunLog::new();
        let concurrency = self.config.max_concurrent_runs().max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let mut pending = self.config.start_urls().to_vec().into_iter().enumerate();
        let mut active = FuturesUnordered::new();
        let mut finished: Vec<(usize, SeedReport, Vec<MediaItem>)> = Vec::new();

        log.info("run", "", format!("starting {} seed(s), {concurrency} worker(s)", pending.len()));

        loop {
            while active.len() < concurrency {
                let Some((index, seed)) = pending.next() else {
                    break;
                };
                let earlier = self.previous_seed(&seed);
                if let Some(earlier) = earlier.filter(|r| r.is_finished()) {
                    log.info("run", &seed, "finished in the resumed run, skipping");
                    finished.push((index, SeedReport { resumed: true, ..earlier.clone() }, Vec::new()));
                    continue;
                }
                let earlier = earlier.cloned();
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    log.error("run", &seed, "worker pool closed unexpectedly");
                    break;
                };
                let worker = self.worker.clone();
                let guard = guard.clone();
                let log = log.clone();
                active.push(tokio::spawn(async move {
                    let _permit = permit;
                    let (mut report, items) = worker
                        .process_seed(&seed, earlier.as_ref().and_then(|r| r.checkpoint.as_ref()), &guard, &log)
                        .await;
                    if let Some(earlier) = earlier.filter(|r| r.checkpoint.is_some()) {
                        report.pages_visited += earlier.pages_visited;
                        report.items_found += earlier.items_found;
                        let mut errors = earlier.errors;
                        errors.append(&mut report.errors);
                        report.errors = errors;
                    }
                    (index, report, items)
                }));
            }

            match active.next().await {
                Some(Ok(done)) => finished.push(done),
                Some(Err(e)) => log.error("run", "", format!("worker panicked: {e}")),
                None => break,
            }
        }

        if let Err(e) = self.worker.factory.shutdown().await {
            log.warn("run", "", format!("browser shutdown reported errors: {e}"));
        }

        finished.sort_by_key(|(index, _, _)| *index);
        let mut dedup = UrlDeduplicator::new();
        let mut items = Vec::new();
        let resumed_items = match &self.previous {
            Some(previous) if self.config.dedup_urls() => {
                items.extend(dedup.dedup(previous.items.clone()));
                items.len()
            }
            Some(previous) => {
                items.extend(previous.items.iter().cloned());
                items.len()
            }
            None => 0,
        };
        let mut seeds = Vec::with_capacity(finished.len());
        for (_, report, seed_items) in finished {
            if self.config.dedup_urls() {
                items.extend(dedup.dedup(seed_items));
            } else {
                items.extend(seed_items);
            }
            seeds.push(report);
        }

        let report = RunReport {
            total_pages_visited: seeds.iter().map(|s| s.pages_visited).sum(),
            duplicates_removed: dedup.removed(),
            resumed_items,
            cancelled: self.token.is_cancelled(),
            timed_out: guard.is_expired(),
            items,
            seeds,
            log: Vec::new(),
        };
        log.info(
            "run",
            "",
            format!(
                "finished: {} items from {} pages ({} duplicates removed, {} resumed)",
                report.items.len(),
                report.total_pages_visited,
                report.duplicates_removed,
                report.resumed_items
            ),
        );
        RunReport {
            log: log.entries(),
            ..report
        }
    }
}

impl RunController {
    /// Report for `seed` in the run being resumed
    fn previous_seed(&self, seed: &str) -> Option<&SeedReport> {
        self.previous.as_ref()?.seeds.iter().find(|r| r.url == seed)
    }
}

impl SeedWorker {
    async fn process_seed(
        &self,
        seed: &str,
        checkpoint: Option<&CrawlCheckpoint>,
        guard: &RunGuard,
        log: &RunLog,
    ) -> (SeedReport, Vec<MediaItem>) {
        let handler = self.registry.resolve_or_fallback(seed);
        let mut report = SeedReport::skipped(seed, handler.name(), StopReason::Completed);
        report.checkpoint = checkpoint.cloned();
        if let Err(e) = guard.check() {
            report.stop_reason = StopReason::from_error(&e);
            return (report, Vec::new());
        }
        log.info("run", seed, format!("handler '{}'", handler.name()));

        let credential = self.credentials.load(seed);
        let session = if handler.supports(Strategy::AutomatedDom) || credential.is_some() {
            match self.factory.open_session().await {
                Ok(session) => Some(session),
                Err(e) => {
                    log.warn("run", seed, format!("browser session unavailable: {e}"));
                    None
                }
            }
        } else {
            None
        };

        let auth = match self
            .authenticate(handler.as_ref(), session.as_deref(), credential.as_ref(), seed, guard, log)
            .await
        {
            Ok(auth) => auth,
            Err(e) => {
                report.stop_reason = StopReason::from_error(&e);
                close_session(session, seed, log).await;
                return (report, Vec::new());
            }
        };
        report.auth_method = auth.map(|a| a.method);
        report.authenticated = auth.is_some_and(|a| a.success);

        let outcome = match checkpoint {
            Some(checkpoint) => {
                self.crawler
                    .resume(checkpoint, handler.as_ref(), session.as_deref(), auth.as_ref(), guard, log)
                    .await
            }
            None => {
                self.crawler
                    .crawl(seed, handler.as_ref(), session.as_deref(), auth.as_ref(), guard, log)
                    .await
            }
        };
        close_session(session, seed, log).await;

        report.strategy_used = outcome.strategy_used;
        report.pages_visited = outcome.pages_visited;
        report.items_found = outcome.items.len();
        report.stop_reason = outcome.stop_reason;
        report.errors = outcome.errors;
        report.checkpoint = outcome.checkpoint;
        (report, outcome.items)
    }

    /// Authentication outcome, `None` when no credential applies.
    ///
    /// Only stop errors are returned; a failed login is a warning unless the
    /// handler requires authentication, which the pipeline enforces.
    async fn authenticate(
        &self,
        handler: &dyn SiteHandler,
        session: Option<&dyn BrowserSession>,
        credential: Option<&Credential>,
        seed: &str,
        guard: &RunGuard,
        log: &RunLog,
    ) -> ExtractResult<Option<AuthResult>> {
        let Some(credential) = credential else {
            if handler.requires_auth() {
                log.warn("auth", seed, "handler requires authentication but no credential matches");
            }
            return Ok(None);
        };
        let Some(session) = session else {
            log.warn("auth", seed, "no browser session to authenticate");
            return Ok(Some(AuthResult::failed()));
        };

        let result = self
            .authenticator
            .authenticate(session, credential, seed, guard, log)
            .await?;
        if result.success {
            log.info("auth", seed, format!("authenticated via {}", result.method));
        } else {
            log.warn("auth", seed, "authentication failed, continuing unauthenticated");
        }
        Ok(Some(result))
    }
}

async fn close_session(session: Option<Box<dyn BrowserSession>>, seed: &str, log: &RunLog) {
    if let Some(session) = session
        && let Err(e) = session.close().await
    {
        log.warn("run", seed, format!("failed to close browser session: {e}"));
    }
}
