//! Fallback handler for sites without a dedicated plugin
//!
//! Collects every image, video and audio reference the page exposes. It
//! claims every URL but sits at the lowest priority, and the registry only
//! hands it out when nothing else matches.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use super::js_scripts::MEDIA_SCRIPT;
use super::traits::SiteHandler;
use crate::browser::BrowserSession;
use crate::errors::ExtractResult;
use crate::media::{MediaItem, MediaType};
use crate::pipeline::{ExtractionContext, PageMeta};
use crate::utils::resolve_url;

const NON_CONTENT_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".json", ".xml", ".pdf", ".zip", ".jpg", ".jpeg", ".png", ".gif", ".webp",
    ".mp4", ".mp3",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| panic!("BUG: hardcoded CSS selector '{css}' is invalid"))
}

static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static PICTURE_SOURCE: LazyLock<Selector> = LazyLock::new(|| selector("picture source[srcset]"));
static VIDEO: LazyLock<Selector> = LazyLock::new(|| selector("video"));
static AUDIO: LazyLock<Selector> = LazyLock::new(|| selector("audio"));
static SOURCE: LazyLock<Selector> = LazyLock::new(|| selector("source[src]"));
static OG_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[property="og:image"], meta[name="og:image"]"#));
static OG_VIDEO: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[property="og:video"], meta[property="og:video:url"]"#));
static META: LazyLock<Selector> = LazyLock::new(|| selector("meta"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static STYLED: LazyLock<Selector> = LazyLock::new(|| selector(r#"[style*="background"]"#));

/// Pick the widest candidate of a `srcset` attribute.
///
/// `w` descriptors compare by width, `x` descriptors by density; a candidate
/// without a descriptor counts as `1x`.
#[must_use]
pub fn parse_srcset(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?;
            let descriptor = parts.next().unwrap_or("1x");
            let weight = if let Some(w) = descriptor.strip_suffix('w') {
                w.parse::<f64>().ok()?
            } else if let Some(x) = descriptor.strip_suffix('x') {
                x.parse::<f64>().ok()? * 1000.0
            } else {
                1000.0
            };
            Some((url, weight))
        })
        .fold(None::<(&str, f64)>, |best, (url, weight)| match best {
            Some((_, best_weight)) if best_weight >= weight => best,
            _ => Some((url, weight)),
        })
        .map(|(url, _)| url.to_string())
}

/// Title and author from `<title>` / `<meta>` tags
#[must_use]
pub fn page_meta_from_html(document: &Html) -> PageMeta {
    let mut meta = PageMeta::default();
    for tag in document.select(&META) {
        let element = tag.value();
        let Some(name) = element.attr("property").or_else(|| element.attr("name")) else {
            continue;
        };
        let content = element.attr("content").map(str::trim).filter(|c| !c.is_empty());
        match name.to_ascii_lowercase().as_str() {
            "og:title" if meta.title.is_none() => meta.title = content.map(str::to_string),
            "author" | "article:author" | "twitter:creator" if meta.author.is_none() => {
                meta.author = content.map(str::to_string);
            }
            _ => {}
        }
    }
    if meta.title.is_none() {
        meta.title = document
            .select(&TITLE)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());
    }
    meta
}

fn attr_u32(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().trim_end_matches("px").parse::<u32>().ok())
        .unwrap_or(0)
}

/// Handler of last resort
#[derive(Debug, Clone, Default)]
pub struct GenericHandler;

impl GenericHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteHandler for GenericHandler {
    fn name(&self) -> &str {
        "generic"
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn can_handle(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    fn is_content_link(&self, url: &Url) -> bool {
        let path = url.path().to_ascii_lowercase();
        !NON_CONTENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }

    async fn extract_via_automated_dom(
        &self,
        session: &dyn BrowserSession,
        _ctx: &ExtractionContext,
    ) -> ExtractResult<Vec<MediaItem>> {
        let raw = session.evaluate(MEDIA_SCRIPT).await?;
        Ok(serde_json::from_value(raw)?)
    }

    fn extract_via_static_html(
        &self,
        document: &Html,
        ctx: &ExtractionContext,
    ) -> ExtractResult<Vec<MediaItem>> {
        let base = ctx.target_url.as_str();
        let mut items: Vec<MediaItem> = Vec::new();
        let mut push = |reference: Option<&str>, item: MediaItem| {
            let Some(url) = reference.and_then(|r| resolve_url(base, r)) else {
                return;
            };
            if items.iter().any(|i| i.url == url) {
                return;
            }
            items.push(MediaItem { url, ..item });
        };

        for img in document.select(&IMG) {
            let el = img.value();
            let reference = el
                .attr("srcset")
                .or_else(|| el.attr("data-srcset"))
                .and_then(parse_srcset)
                .or_else(|| {
                    ["data-src", "data-original", "data-lazy-src", "data-full", "src"]
                        .iter()
                        .find_map(|a| el.attr(a))
                        .map(str::to_string)
                });
            let mut item = MediaItem::new(String::new(), MediaType::Image)
                .with_dimensions(attr_u32(el.attr("width")), attr_u32(el.attr("height")));
            item.alt = el.attr("alt").map(str::trim).filter(|a| !a.is_empty()).map(str::to_string);
            item.title = el.attr("title").map(str::to_string);
            push(reference.as_deref(), item);
        }

        for source in document.select(&PICTURE_SOURCE) {
            let best = source.value().attr("srcset").and_then(parse_srcset);
            push(best.as_deref(), MediaItem::new(String::new(), MediaType::Image));
        }

        for (tag, media_type) in [(&*VIDEO, MediaType::Video), (&*AUDIO, MediaType::Audio)] {
            for element in document.select(tag) {
                push(element.value().attr("src"), MediaItem::new(String::new(), media_type));
                for source in element.select(&SOURCE) {
                    push(source.value().attr("src"), MediaItem::new(String::new(), media_type));
                }
            }
        }

        for meta in document.select(&OG_IMAGE) {
            push(meta.value().attr("content"), MediaItem::new(String::new(), MediaType::Image));
        }
        for meta in document.select(&OG_VIDEO) {
            push(meta.value().attr("content"), MediaItem::new(String::new(), MediaType::Video));
        }

        for styled in document.select(&STYLED) {
            let style = styled.value().attr("style").unwrap_or_default();
            if let Some(reference) = background_url(style) {
                push(Some(reference), MediaItem::new(String::new(), MediaType::Image));
            }
        }

        Ok(items)
    }
}

/// First `url(...)` reference of an inline style
fn background_url(style: &str) -> Option<&str> {
    let start = style.find("url(")? + 4;
    let rest = &style[start..];
    let end = rest.find(')')?;
    let inner = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
    (!inner.is_empty()).then_some(inner)
}
