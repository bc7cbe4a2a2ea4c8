//! Handler registration and URL resolution

use std::sync::Arc;
use url::Url;

use super::generic::GenericHandler;
use super::traits::SiteHandler;
use crate::errors::{ExtractError, ExtractResult};

/// Registered handlers, kept in descending priority order
///
/// Handlers with equal priority keep their registration order, so the one
/// registered first wins. The registry is built at startup and shared
/// read-only by every worker.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn SiteHandler>>,
    fallback: Arc<dyn SiteHandler>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// Empty registry falling back to [`GenericHandler`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            fallback: Arc::new(GenericHandler::new()),
        }
    }

    /// Replace the handler used when nothing else matches
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn SiteHandler>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Add a handler
    pub fn register(&mut self, handler: Arc<dyn SiteHandler>) {
        let priority = handler.priority();
        let position = self
            .handlers
            .iter()
            .position(|existing| existing.priority() < priority)
            .unwrap_or(self.handlers.len());
        log::debug!(
            target: "mediascrape::handlers",
            "Registered handler '{}' (priority {priority})",
            handler.name()
        );
        self.handlers.insert(position, handler);
    }

    /// Builder-style [`register`](Self::register)
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn SiteHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Highest-priority handler claiming `url`
    pub fn resolve(&self, url: &str) -> ExtractResult<Arc<dyn SiteHandler>> {
        let parsed = Url::parse(url).map_err(|_| ExtractError::InvalidUrl(url.to_string()))?;
        self.handlers
            .iter()
            .find(|h| h.can_handle(&parsed))
            .cloned()
            .ok_or_else(|| ExtractError::HandlerNotFound(url.to_string()))
    }

    /// [`resolve`](Self::resolve), substituting the fallback handler on a miss
    #[must_use]
    pub fn resolve_or_fallback(&self, url: &str) -> Arc<dyn SiteHandler> {
        match self.resolve(url) {
            Ok(handler) => handler,
            Err(e) => {
                log::info!(
                    target: "mediascrape::handlers",
                    "{e}; using '{}'",
                    self.fallback.name()
                );
                self.fallback.clone()
            }
        }
    }

    #[must_use]
    pub fn fallback(&self) -> Arc<dyn SiteHandler> {
        self.fallback.clone()
    }

    /// Handler names in resolution order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
