//! Next-page URL derivation for paged listings

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::handlers::Pagination;

static PAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*/page/)(\d+)(/?)$").unwrap_or_else(|e| panic!("BUG: page path regex: {e}"))
});

const AUTO_QUERY_KEYS: &[&str] = &["page", "p", "pg"];

/// URL of the page after `current` under `rule`; `None` when the rule does
/// not paginate or the URL cannot be parsed.
#[must_use]
pub fn next_page_url(current: &str, rule: &Pagination) -> Option<String> {
    let url = Url::parse(current).ok()?;
    match rule {
        Pagination::None => None,
        Pagination::QueryParam(name) => Some(bump_query(url, name)),
        Pagination::PathSegment => Some(bump_path(url)),
        Pagination::Auto => {
            if let Some(key) = url
                .query_pairs()
                .find(|(k, v)| AUTO_QUERY_KEYS.contains(&k.as_ref()) && v.parse::<u64>().is_ok())
                .map(|(k, _)| k.into_owned())
            {
                return Some(bump_query(url, &key));
            }
            if PAGE_PATH.is_match(url.path()) {
                return Some(bump_path(url));
            }
            Some(bump_query(url, "page"))
        }
    }
}

/// Increment `name`, treating a missing or non-numeric value as page 1
fn bump_query(mut url: Url, name: &str) -> String {
    let mut found = false;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == name && !found {
                found = true;
                let next = v.parse::<u64>().unwrap_or(1).saturating_add(1);
                (k.into_owned(), next.to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear().extend_pairs(&pairs);
        if !found {
            query.append_pair(name, "2");
        }
    }
    url.to_string()
}

/// `/page/N` → `/page/N+1`, trailing `/N` → `/N+1`, otherwise append `/page/2`
fn bump_path(mut url: Url) -> String {
    let path = url.path().to_string();
    let next_path = if let Some(caps) = PAGE_PATH.captures(&path) {
        let n = caps[2].parse::<u64>().unwrap_or(1).saturating_add(1);
        format!("{}{n}{}", &caps[1], &caps[3])
    } else {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some((head, last)) if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) => {
                let n = last.parse::<u64>().unwrap_or(1).saturating_add(1);
                format!("{head}/{n}")
            }
            _ => format!("{trimmed}/page/2"),
        }
    };
    url.set_path(&next_path);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_increments_existing_page_param() {
        assert_eq!(
            next_page_url("https://a.com/search?q=cats&page=3", &Pagination::Auto).as_deref(),
            Some("https://a.com/search?q=cats&page=4")
        );
    }

    #[test]
    fn auto_adds_page_two() {
        assert_eq!(
            next_page_url("https://a.com/gallery", &Pagination::Auto).as_deref(),
            Some("https://a.com/gallery?page=2")
        );
    }

    #[test]
    fn path_segment_rules() {
        assert_eq!(
            next_page_url("https://a.com/art/page/2/", &Pagination::PathSegment).as_deref(),
            Some("https://a.com/art/page/3/")
        );
        assert_eq!(
            next_page_url("https://a.com/art/7", &Pagination::PathSegment).as_deref(),
            Some("https://a.com/art/8")
        );
        assert_eq!(
            next_page_url("https://a.com/art", &Pagination::PathSegment).as_deref(),
            Some("https://a.com/art/page/2")
        );
    }

    #[test]
    fn named_query_param() {
        assert_eq!(
            next_page_url("https://a.com/list", &Pagination::QueryParam("offset_page".into()))
                .as_deref(),
            Some("https://a.com/list?offset_page=2")
        );
        assert_eq!(next_page_url("https://a.com/list", &Pagination::None), None);
    }
}
