//! Trust decisions for media hosted away from the page's own domain

use url::Url;

use super::traits::SiteHandler;
use crate::utils::registrable_domain;

/// Host fragments that identify content delivery networks
const CDN_INDICATORS: &[&str] = &[
    "cloudfront.net",
    "cloudflare.com",
    "akamai",
    "fastly.net",
    "googleapis.com",
    "gstatic.com",
    "googleusercontent.com",
    "imgix.net",
    "twimg.com",
    "cdninstagram.com",
    "fbcdn.net",
    "cdn.",
    "static.",
    "assets.",
    "media.",
    "content.",
    "images.",
];

/// Substring heuristic used unless a handler overrides `is_cdn_host`
#[must_use]
pub fn default_is_cdn_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    CDN_INDICATORS.iter().any(|indicator| host.contains(indicator))
}

/// Decides whether a candidate media URL is trusted for a page
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustPolicy;

impl TrustPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Trusted when the candidate shares the page's registrable domain, is
    /// hosted on one of the handler's trusted domains, or passes the
    /// handler's CDN heuristic. Unparseable URLs are never trusted.
    #[must_use]
    pub fn is_trusted(&self, candidate: &str, page_url: &str, handler: &dyn SiteHandler) -> bool {
        let Some(candidate_host) = Url::parse(candidate)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };

        if let Some(page_host) = Url::parse(page_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            && registrable_domain(&candidate_host) == registrable_domain(&page_host)
        {
            return true;
        }

        let on_trusted_domain = handler.trusted_domains().iter().any(|domain| {
            let domain = domain.trim_start_matches('.').to_ascii_lowercase();
            candidate_host == domain || candidate_host.ends_with(&format!(".{domain}"))
        });

        on_trusted_domain || handler.is_cdn_host(&candidate_host)
    }
}
