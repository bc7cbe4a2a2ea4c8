//! Error types for extraction operations
//!
//! One taxonomy is shared by every stage of a run. Per-item and per-strategy
//! failures are logged and absorbed; only the abort variants escalate.

use thiserror::Error;

/// Result type alias for extraction operations
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Error types for extraction operations
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No registered handler claims the URL
    #[error("No handler registered for {0}")]
    HandlerNotFound(String),

    /// Authentication was attempted and did not succeed
    #[error("Authentication failed for {domain}: {reason}")]
    AuthenticationFailed { domain: String, reason: String },

    /// A strategy raised while extracting
    #[error("Strategy {strategy} failed: {message}")]
    StrategyError { strategy: String, message: String },

    /// The handler only supports its API and the API produced nothing
    #[error("API extraction required by handler '{handler}' failed: {reason}")]
    ApiRequired { handler: String, reason: String },

    /// Page navigation exceeded its timeout
    #[error("Navigation to {url} timed out after {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    /// A browser operation other than navigation exceeded its timeout
    #[error("{operation} timed out after {millis}ms")]
    OperationTimeout { operation: String, millis: u64 },

    /// The run's cancellation token was set
    #[error("Operation was cancelled")]
    Cancelled,

    /// The run's wall-clock budget expired
    #[error("Run deadline exceeded")]
    DeadlineExceeded,

    /// An upgraded URL did not answer with a 2xx status
    #[error("Verification failed for {url}: {reason}")]
    VerificationFailed { url: String, reason: String },

    /// Browser protocol failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL failed to parse or is not http(s)
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ExtractError {
    fn from(error: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        ExtractError::Other(format!("{error:#}"))
    }
}

impl From<url::ParseError> for ExtractError {
    fn from(error: url::ParseError) -> Self {
        ExtractError::InvalidUrl(error.to_string())
    }
}

impl ExtractError {
    /// Errors that stop the current pipeline instead of falling through to
    /// the next strategy.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            ExtractError::Cancelled
                | ExtractError::DeadlineExceeded
                | ExtractError::NavigationTimeout { .. }
                | ExtractError::OperationTimeout { .. }
        )
    }

    /// Errors caused by the run being stopped rather than by the site
    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self, ExtractError::Cancelled | ExtractError::DeadlineExceeded)
    }

    /// Short machine-readable name used in structured logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::HandlerNotFound(_) => "handler_not_found",
            ExtractError::AuthenticationFailed { .. } => "authentication_failed",
            ExtractError::StrategyError { .. } => "strategy_error",
            ExtractError::ApiRequired { .. } => "api_required",
            ExtractError::NavigationTimeout { .. } => "navigation_timeout",
            ExtractError::OperationTimeout { .. } => "operation_timeout",
            ExtractError::Cancelled => "cancelled",
            ExtractError::DeadlineExceeded => "deadline_exceeded",
            ExtractError::VerificationFailed { .. } => "verification_failed",
            ExtractError::Browser(_) => "browser",
            ExtractError::Http(_) => "http",
            ExtractError::Json(_) => "json",
            ExtractError::Io(_) => "io",
            ExtractError::InvalidUrl(_) => "invalid_url",
            ExtractError::Config(_) => "config",
            ExtractError::Other(_) => "other",
        }
    }
}
