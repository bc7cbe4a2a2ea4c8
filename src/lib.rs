pub mod auth;
pub mod browser;
pub mod config;
pub mod crawl;
pub mod dedup;
pub mod errors;
pub mod handlers;
pub mod media;
pub mod pipeline;
pub mod run;
pub mod utils;

use std::sync::Arc;

pub use auth::{
    AuthMethod, AuthResult, CookieEntry, Credential, CredentialStore, SessionAuthenticator,
    SessionStore,
};
pub use browser::{BrowserSession, ChromiumSessionFactory, SessionFactory};
pub use config::ScrapeConfig;
pub use crawl::{CrawlCheckpoint, CrawlController, CrawlOutcome, HandlerThrottle, StopReason, VisitedSet};
pub use dedup::{DuplicateAction, HashAlgorithm, PerceptualDeduplicator, UrlDeduplicator};
pub use errors::{ExtractError, ExtractResult};
pub use handlers::{GenericHandler, HandlerRegistry, Pagination, SiteHandler, Strategy, TrustPolicy};
pub use media::{MediaItem, MediaType};
pub use pipeline::{
    ExtractionContext, ExtractionPipeline, HttpClient, MediaFilter, PipelineReport, PipelineState,
    ResolutionUpgrader, RunLog,
};
pub use run::{CancellationToken, RunController, RunGuard, RunReport, SeedReport};

/// Run every start URL of `config` with `registry` on a fresh Chromium
/// instance and return the merged report.
pub async fn extract(config: ScrapeConfig, registry: HandlerRegistry) -> ExtractResult<RunReport> {
    let factory = Arc::new(ChromiumSessionFactory::launch(&config).await?);
    let controller = RunController::new(config, registry, factory)?;
    Ok(controller.run().await)
}
