//! URL manipulation utilities.
//!
//! This module provides the URL helpers shared by trust decisions, the
//! visited set and deduplication.

use url::Url;

/// Query parameters that only carry tracking state and never select content
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "msclkid", "_ga", "ref", "source", "mc_cid", "mc_eid",
];

/// Second-level labels under which registrations happen one level deeper
/// (`example.co.uk` rather than `co.uk`).
const MULTI_PART_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "com.au", "net.au", "org.au", "co.jp", "ne.jp",
    "or.jp", "co.nz", "com.br", "com.cn", "com.mx", "co.in", "co.kr", "com.tw", "co.za",
];

/// Check if a URL is valid
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    // Skip data URLs, javascript URLs, and other non-http schemes
    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Resolve a possibly-relative reference against the page it was found on.
///
/// Protocol-relative references (`//cdn.example.com/a.jpg`) inherit the
/// page's scheme. Returns `None` for references that do not resolve to an
/// http(s) URL.
#[must_use]
pub fn resolve_url(base: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty()
        || reference.starts_with("data:")
        || reference.starts_with("javascript:")
        || reference.starts_with("blob:")
    {
        return None;
    }

    let resolved = match Url::parse(reference) {
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(reference).ok()?,
        Err(_) => return None,
    };

    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Lower-cased host of a URL string
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

/// Registrable domain of a host (`img.cdn.example.co.uk` → `example.co.uk`).
///
/// IP addresses and single-label hosts are returned unchanged.
#[must_use]
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if MULTI_PART_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    labels[labels.len().saturating_sub(keep)..].join(".")
}

/// Whether two URLs share a registrable domain
#[must_use]
pub fn same_registrable_domain(a: &str, b: &str) -> bool {
    match (host_of(a), host_of(b)) {
        (Some(ha), Some(hb)) => registrable_domain(&ha) == registrable_domain(&hb),
        _ => false,
    }
}

/// Canonical form of a media URL used as the stage-1 deduplication key.
///
/// Query string and fragment are stripped; scheme and host are lower-cased by
/// the URL parser. Unparseable input is returned trimmed.
#[must_use]
pub fn canonical_media_url(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

/// Normalized form of a page URL used as the visited-set key.
///
/// Removes the fragment, tracking parameters and a trailing slash, and sorts
/// the remaining query parameters so equivalent pages compare equal.
#[must_use]
pub fn normalize_page_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url.trim()) else {
        return url.trim().trim_end_matches('/').to_string();
    };
    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }

    if parsed.path().len() > 1 && parsed.path().ends_with('/') {
        let trimmed = parsed.path().trim_end_matches('/').to_string();
        parsed.set_path(&trimmed);
    }

    let mut out = parsed.to_string();
    if parsed.query().is_none() && parsed.path() == "/" {
        out.truncate(out.trim_end_matches('/').len());
    }
    out
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Last path segment without its extension (`/a/b/sunset_01.jpg` → `sunset_01`)
#[must_use]
pub fn file_stem_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let stem = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
    (!stem.is_empty()).then(|| stem.replace("%20", " "))
}
