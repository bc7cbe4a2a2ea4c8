//! Per-target extraction: strategy fallback, HTTP access, resolution
//! upgrade and normalization.

pub mod context;
pub mod executor;
pub mod filter;
pub mod http;
pub mod normalize;
pub mod upgrade;

pub use context::{
    ExtractionContext, LogEntry, LogLevel, PageClassification, PageInfo, PageMeta, RunLog,
};
pub use executor::{AttemptOutcome, ExtractionPipeline, PipelineReport, PipelineState, StrategyAttempt};
pub use filter::MediaFilter;
pub use http::HttpClient;
pub use normalize::Normalizer;
pub use upgrade::ResolutionUpgrader;
