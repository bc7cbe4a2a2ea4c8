//! Size and URL-pattern filters applied to every extracted item

use regex::Regex;

use crate::config::ScrapeConfig;
use crate::config::builder::compile_pattern;
use crate::media::MediaItem;

/// Drops items that are too small or whose URL the patterns reject.
///
/// A dimension of 0 means unknown and always passes.
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    min_width: u32,
    min_height: u32,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl MediaFilter {
    /// Filter with no limits
    #[must_use]
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Patterns that fail to compile are skipped; config validation
    /// rejects them before a run starts.
    #[must_use]
    pub fn from_config(config: &ScrapeConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<Regex> {
            patterns
                .iter()
                .filter_map(|p| match compile_pattern(p) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        log::warn!(target: "mediascrape::filter", "ignoring invalid URL pattern '{p}': {e}");
                        None
                    }
                })
                .collect()
        };
        Self {
            min_width: config.min_width(),
            min_height: config.min_height(),
            include: compile(config.include_patterns()),
            exclude: compile(config.exclude_patterns()),
        }
    }

    /// Why `item` is dropped, or `None` when it passes
    #[must_use]
    pub fn rejection(&self, item: &MediaItem) -> Option<String> {
        if item.width > 0 && item.width < self.min_width {
            return Some(format!("narrower than {}px", self.min_width));
        }
        if item.height > 0 && item.height < self.min_height {
            return Some(format!("shorter than {}px", self.min_height));
        }
        if let Some(pattern) = self.exclude.iter().find(|p| p.is_match(&item.url)) {
            return Some(format!("matches excluded pattern '{}'", pattern.as_str()));
        }
        if !self.include.is_empty() && !self.include.iter().any(|p| p.is_match(&item.url)) {
            return Some("matches no included pattern".to_string());
        }
        None
    }
}
