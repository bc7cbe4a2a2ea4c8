//! Link filtering and prioritization for the next crawl depth

use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use super::visited::VisitedSet;
use crate::handlers::SiteHandler;
use crate::utils::{MAX_LINKS_PER_PAGE, normalize_page_url, resolve_url, same_registrable_domain};

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").unwrap_or_else(|_| panic!("BUG: hardcoded CSS selector 'a[href]' is invalid"))
});

const HIGH_VALUE_MARKERS: &[&str] = &[
    "gallery", "album", "collection", "artwork", "artist", "photo", "image", "media", "video",
    "asset", "exhibit", "portfolio", "post",
];

const LOW_VALUE_MARKERS: &[&str] = &[
    "login", "signin", "sign-in", "signup", "register", "logout", "about", "contact", "terms",
    "privacy", "policy", "help", "faq", "cart", "checkout", "settings",
];

/// Lower sorts first: 0 likely holds media, 2 is site chrome
#[must_use]
pub fn link_priority(url: &Url) -> u8 {
    let path = url.path().to_ascii_lowercase();
    if LOW_VALUE_MARKERS.iter().any(|m| path.contains(m)) {
        2
    } else if HIGH_VALUE_MARKERS.iter().any(|m| path.contains(m)) {
        0
    } else {
        1
    }
}

/// Whether a discovered link may be queued from `page_url`.
///
/// The link must stay on the page's registrable domain or one of the
/// handler's trusted domains, and the handler must consider it content.
#[must_use]
pub fn should_follow(link: &Url, page_url: &str, handler: &dyn SiteHandler) -> bool {
    if !matches!(link.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = link.host_str() else {
        return false;
    };
    let on_site = same_registrable_domain(link.as_str(), page_url)
        || handler
            .trusted_domains()
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{d}")));
    on_site && handler.is_content_link(link)
}

/// Absolute anchor targets of an HTML document, for sessions without a browser
#[must_use]
pub fn links_from_html(html: &str, base: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_url(base, href))
        .collect()
}

/// Filter, dedupe and rank links found on `page_url`, keeping at most
/// [`MAX_LINKS_PER_PAGE`].
#[must_use]
pub fn select_links(
    links: &[String],
    page_url: &str,
    handler: &dyn SiteHandler,
    visited: &VisitedSet,
) -> Vec<String> {
    let page_key = normalize_page_url(page_url);
    let mut seen = VisitedSet::new();
    let mut ranked: Vec<(u8, String)> = Vec::new();

    for raw in links {
        let Ok(mut link) = Url::parse(raw) else {
            continue;
        };
        link.set_fragment(None);
        if !should_follow(&link, page_url, handler) {
            continue;
        }
        let link_str = link.to_string();
        if normalize_page_url(&link_str) == page_key
            || visited.contains(&link_str)
            || !seen.insert(&link_str)
        {
            continue;
        }
        ranked.push((link_priority(&link), link_str));
    }

    ranked.sort_by_key(|(priority, _)| *priority);
    ranked
        .into_iter()
        .take(MAX_LINKS_PER_PAGE)
        .map(|(_, url)| url)
        .collect()
}
