//! Thumbnail to full-resolution URL rewriting
//!
//! Three heuristics run in order and the first that changes the URL wins:
//!
//! 1. numeric size tokens (`_400x300`, `-200x200`, `?w=400&h=300`) scaled up
//!    to the target size, preserving aspect ratio;
//! 2. named size path segments (`/thumbs/` → `/large/`), per handler;
//! 3. single-letter size suffixes before the extension (`photo_m.jpg`).
//!
//! Only the path and query are ever rewritten; scheme and host are kept.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use super::context::RunLog;
use super::http::HttpClient;
use crate::handlers::SiteHandler;

static SIZE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[_-])(\d{1,5})x(\d{1,5})").unwrap_or_else(|e| panic!("BUG: size token regex: {e}"))
});

static SIZE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)_(?:m|s|t|q|n)(\.[A-Za-z0-9]+)$")
        .unwrap_or_else(|e| panic!("BUG: size suffix regex: {e}"))
});

const WIDTH_KEYS: &[&str] = &["w", "width"];
const HEIGHT_KEYS: &[&str] = &["h", "height"];

/// Scale `(w, h)` so its longer side reaches `target`.
///
/// Returns `None` when either side is already at or above the target.
fn scale_to_target(width: u32, height: u32, target: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || width >= target || height >= target {
        return None;
    }
    let (w, h, t) = (u64::from(width), u64::from(height), u64::from(target));
    let scaled = if w >= h {
        (t, t * h / w)
    } else {
        (t * w / h, t)
    };
    Some((
        u32::try_from(scaled.0).unwrap_or(target),
        u32::try_from(scaled.1).unwrap_or(target),
    ))
}

/// Rewrites thumbnail URLs and optionally verifies the result
#[derive(Debug, Clone, Copy)]
pub struct ResolutionUpgrader {
    target_px: u32,
    verify: bool,
    verify_timeout: Duration,
}

impl ResolutionUpgrader {
    #[must_use]
    pub fn new(target_px: u32, verify: bool, verify_timeout: Duration) -> Self {
        Self {
            target_px,
            verify,
            verify_timeout,
        }
    }

    #[must_use]
    pub fn target_px(&self) -> u32 {
        self.target_px
    }

    /// Candidate full-resolution URL, or `None` when no heuristic applies
    #[must_use]
    pub fn upgrade(&self, url: &str, handler: &dyn SiteHandler) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        self.upgrade_numeric(&parsed)
            .or_else(|| Self::upgrade_named_segments(&parsed, handler.size_substitutions()))
            .or_else(|| Self::upgrade_suffix(&parsed))
            .filter(|candidate| candidate != url)
    }

    fn upgrade_numeric(&self, url: &Url) -> Option<String> {
        let mut changed = false;

        let segments: Vec<String> = url
            .path_segments()
            .map(|s| s.map(str::to_string).collect())
            .unwrap_or_default();
        let rewritten: Vec<String> = segments
            .iter()
            .map(|segment| {
                let replaced = SIZE_TOKEN.replace_all(segment, |caps: &regex::Captures<'_>| {
                    let width = caps[2].parse::<u32>().unwrap_or(0);
                    let height = caps[3].parse::<u32>().unwrap_or(0);
                    match scale_to_target(width, height, self.target_px) {
                        Some((w, h)) => {
                            changed = true;
                            format!("{}{w}x{h}", &caps[1])
                        }
                        None => caps[0].to_string(),
                    }
                });
                replaced.into_owned()
            })
            .collect();

        let query = self.scale_query(url);

        if !changed && query.is_none() {
            return None;
        }
        let mut out = url.clone();
        if changed {
            out.set_path(&format!("/{}", rewritten.join("/")));
        }
        if let Some(query) = query {
            out.set_query(Some(&query));
        }
        Some(out.to_string())
    }

    /// Raw query with a `w`/`width` and `h`/`height` pair, or a lone width,
    /// scaled up. Every other parameter keeps its original bytes.
    fn scale_query(&self, url: &Url) -> Option<String> {
        let mut params: Vec<(&str, Option<&str>)> = url
            .query()?
            .split('&')
            .map(|param| match param.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (param, None),
            })
            .collect();
        let find = |keys: &[&str], params: &[(&str, Option<&str>)]| {
            params.iter().position(|(k, v)| {
                keys.contains(&k.to_ascii_lowercase().as_str())
                    && v.is_some_and(|v| v.parse::<u32>().is_ok())
            })
        };
        let value_at = |i: usize, params: &[(&str, Option<&str>)]| {
            params[i].1.and_then(|v| v.parse::<u32>().ok()).unwrap_or(0)
        };

        let (width, height) = match (find(WIDTH_KEYS, &params), find(HEIGHT_KEYS, &params)) {
            (Some(wi), Some(hi)) => {
                let (w, h) = scale_to_target(value_at(wi, &params), value_at(hi, &params), self.target_px)?;
                (Some((wi, w.to_string())), Some((hi, h.to_string())))
            }
            (Some(wi), None) => {
                let width = value_at(wi, &params);
                if width == 0 || width >= self.target_px {
                    return None;
                }
                (Some((wi, self.target_px.to_string())), None)
            }
            _ => return None,
        };

        let scaled: Vec<(usize, String)> = width.into_iter().chain(height).collect();
        for (i, value) in &scaled {
            params[*i].1 = Some(value.as_str());
        }
        Some(
            params
                .iter()
                .map(|(key, value)| match value {
                    Some(value) => format!("{key}={value}"),
                    None => (*key).to_string(),
                })
                .collect::<Vec<_>>()
                .join("&"),
        )
    }

    fn upgrade_named_segments(url: &Url, substitutions: &[(&str, &str)]) -> Option<String> {
        let segments: Vec<&str> = url.path_segments()?.collect();
        let mut changed = false;
        let rewritten: Vec<&str> = segments
            .iter()
            .map(|segment| {
                substitutions
                    .iter()
                    .find(|(from, _)| segment.eq_ignore_ascii_case(from))
                    .map_or(*segment, |(_, to)| {
                        changed = true;
                        *to
                    })
            })
            .collect();
        if !changed {
            return None;
        }
        let mut out = url.clone();
        out.set_path(&format!("/{}", rewritten.join("/")));
        Some(out.to_string())
    }

    fn upgrade_suffix(url: &Url) -> Option<String> {
        let mut segments: Vec<&str> = url.path_segments()?.collect();
        let last = segments.pop()?;
        let caps = SIZE_SUFFIX.captures(last)?;
        let file = format!("{}{}", &caps[1], &caps[2]);
        segments.push(&file);
        let mut out = url.clone();
        out.set_path(&format!("/{}", segments.join("/")));
        Some(out.to_string())
    }

    /// Upgrade `url`, verifying the candidate when enabled.
    ///
    /// A failed verification keeps the original URL and is logged.
    pub async fn upgrade_verified(
        &self,
        url: &str,
        referer: &str,
        handler: &dyn SiteHandler,
        http: &HttpClient,
        log: &RunLog,
    ) -> String {
        let Some(candidate) = self.upgrade(url, handler) else {
            return url.to_string();
        };
        if !self.verify {
            return candidate;
        }
        match http.verify(&candidate, Some(referer), self.verify_timeout).await {
            Ok(()) => {
                log.debug("upgrade", url, format!("upgraded to {candidate}"));
                candidate
            }
            Err(e) => {
                log.warn("upgrade", url, format!("keeping original, {e}"));
                url.to_string()
            }
        }
    }
}
