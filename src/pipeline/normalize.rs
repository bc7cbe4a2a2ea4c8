//! Post-extraction normalization
//!
//! Runs after whichever strategy produced items: handler post-processing,
//! URL resolution, size and pattern filtering, resolution upgrade, trust
//! marking, replay headers and metadata backfill, then the per-page budget.

use std::collections::HashSet;

use super::context::ExtractionContext;
use super::filter::MediaFilter;
use super::http::HttpClient;
use super::upgrade::ResolutionUpgrader;
use crate::handlers::{SiteHandler, TrustPolicy};
use crate::media::MediaItem;
use crate::utils::{canonical_media_url, file_stem_of, is_valid_url, resolve_url, same_registrable_domain};

/// Applies the shared normalization steps to a strategy's raw items
#[derive(Debug, Clone)]
pub struct Normalizer {
    trust: TrustPolicy,
    upgrader: ResolutionUpgrader,
    filter: MediaFilter,
    same_domain_only: bool,
}

impl Normalizer {
    #[must_use]
    pub fn new(upgrader: ResolutionUpgrader, same_domain_only: bool) -> Self {
        Self {
            trust: TrustPolicy::new(),
            upgrader,
            filter: MediaFilter::permissive(),
            same_domain_only,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: MediaFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Normalize `items` found on `ctx.target_url`.
    ///
    /// Items that cannot be resolved to an absolute http(s) URL, items the
    /// filter rejects, and untrusted off-site items when `same_domain_only`
    /// is set, are dropped and logged. The result never exceeds `ctx.remaining_budget`.
    pub async fn normalize(
        &self,
        items: Vec<MediaItem>,
        handler: &dyn SiteHandler,
        ctx: &ExtractionContext,
        http: &HttpClient,
    ) -> Vec<MediaItem> {
        let page = ctx.target_url.as_str();
        let items = handler.post_process(items, ctx);
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(items.len());

        for mut item in items {
            if ctx.remaining_budget.is_some_and(|budget| out.len() >= budget) {
                ctx.log.debug("normalize", page, "item budget reached, dropping the rest");
                break;
            }

            let Some(resolved) = resolve_url(page, item.url.trim()).filter(|u| is_valid_url(u)) else {
                ctx.log.debug("normalize", page, format!("dropping unresolvable url '{}'", item.url));
                continue;
            };
            item.url = resolved;

            if let Some(reason) = self.filter.rejection(&item) {
                ctx.log.debug("normalize", page, format!("dropping {}: {reason}", item.url));
                continue;
            }

            if ctx.guard.check().is_ok() {
                item.url = self
                    .upgrader
                    .upgrade_verified(&item.url, page, handler, http, &ctx.log)
                    .await;
            }

            let trusted = self.trust.is_trusted(&item.url, page, handler);
            if !trusted && self.same_domain_only {
                ctx.log.debug("normalize", page, format!("dropping untrusted off-site item {}", item.url));
                continue;
            }
            item.trusted_cdn = trusted && !same_registrable_domain(&item.url, page);

            if !seen.insert(canonical_media_url(&item.url)) {
                continue;
            }

            item.request_headers
                .entry("Referer".to_string())
                .or_insert_with(|| page.to_string());
            item.request_headers
                .entry("User-Agent".to_string())
                .or_insert_with(|| ctx.user_agent.clone());

            if item.source_url.is_none() {
                item.source_url = Some(page.to_string());
            }
            backfill(&mut item, ctx);
            out.push(item);
        }

        out
    }
}

/// Title falls back to alt text, the page title, then the file name;
/// credits fall back to the page author
fn backfill(item: &mut MediaItem, ctx: &ExtractionContext) {
    let title_missing = item.title.as_deref().is_none_or(|t| t.trim().is_empty());
    if title_missing {
        item.title = item
            .alt
            .clone()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| ctx.page_meta.title.clone())
            .or_else(|| file_stem_of(&item.url));
    }
    if item.credits.is_none() {
        item.credits.clone_from(&ctx.page_meta.author);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use crate::pipeline::{PageMeta, RunLog};
    use crate::run::{CancellationToken, RunGuard};

    #[test]
    fn backfill_order() {
        let mut ctx = ExtractionContext::new(
            "https://a.com/p",
            RunGuard::unbounded(CancellationToken::new()),
            RunLog::new(),
        );
        let mut bare = MediaItem::new("https://a.com/i/sunset_01.jpg", MediaType::Image);
        backfill(&mut bare, &ctx);
        assert_eq!(bare.title.as_deref(), Some("sunset_01"));

        ctx.page_meta = PageMeta {
            title: Some("Page".into()),
            author: Some("Ada".into()),
        };
        let mut with_alt = MediaItem::new("https://a.com/i/x.jpg", MediaType::Image).with_alt("Alt");
        backfill(&mut with_alt, &ctx);
        assert_eq!(with_alt.title.as_deref(), Some("Alt"));
        assert_eq!(with_alt.credits.as_deref(), Some("Ada"));
    }
}
