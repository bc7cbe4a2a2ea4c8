//! Type-safe builder for `ScrapeConfig` using the typestate pattern
//!
//! A config cannot be built until at least one start URL has been supplied.

use anyhow::{Context, Result, anyhow};
use regex::{Regex, RegexBuilder};
use std::marker::PhantomData;
use std::path::Path;

use super::types::ScrapeConfig;
use crate::utils::is_valid_url;

// Type states for the builder
pub struct WithStartUrl;

pub struct ScrapeConfigBuilder<State = ()> {
    pub(crate) config: ScrapeConfig,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ScrapeConfigBuilder<()> {
    fn default() -> Self {
        Self {
            config: ScrapeConfig::default(),
            _phantom: PhantomData,
        }
    }
}

impl ScrapeConfig {
    /// Create a builder for configuring a `ScrapeConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ScrapeConfigBuilder<()> {
        ScrapeConfigBuilder::default()
    }

    /// Load a config from a JSON document. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: ScrapeConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.start_urls = config.start_urls.iter().map(|u| normalize_start_url(u)).collect();
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.start_urls.is_empty() {
            return Err(anyhow!("at least one start URL is required"));
        }
        if let Some(bad) = self.start_urls.iter().find(|u| !is_valid_url(u)) {
            return Err(anyhow!("Invalid start URL '{bad}'"));
        }
        if self.max_pages == 0 {
            return Err(anyhow!("max_pages must be at least 1"));
        }
        if self.max_concurrent_runs == 0 {
            return Err(anyhow!("max_concurrent_runs must be at least 1"));
        }
        if self.page_load_timeout_secs == 0 || self.operation_timeout_secs == 0 {
            return Err(anyhow!("browser timeouts must be non-zero"));
        }
        if self.run_timeout_secs == 0 {
            return Err(anyhow!("run_timeout_secs must be non-zero"));
        }
        if self.upgrade_target_px == 0 {
            return Err(anyhow!("upgrade_target_px must be non-zero"));
        }
        if self.hash_distance > 64 {
            return Err(anyhow!("hash_distance cannot exceed 64 bits"));
        }
        for pattern in self.include_patterns.iter().chain(&self.exclude_patterns) {
            compile_pattern(pattern).with_context(|| format!("Invalid URL pattern '{pattern}'"))?;
        }
        Ok(())
    }
}

/// Compile a case-insensitive URL filter pattern
pub(crate) fn compile_pattern(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Add https:// if no scheme is present
fn normalize_start_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

impl ScrapeConfigBuilder<()> {
    pub fn start_url(mut self, url: impl Into<String>) -> ScrapeConfigBuilder<WithStartUrl> {
        self.config.start_urls.push(normalize_start_url(&url.into()));
        ScrapeConfigBuilder {
            config: self.config,
            _phantom: PhantomData,
        }
    }

    pub fn start_urls<I, S>(mut self, urls: I) -> ScrapeConfigBuilder<WithStartUrl>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .start_urls
            .extend(urls.into_iter().map(|u| normalize_start_url(&u.into())));
        ScrapeConfigBuilder {
            config: self.config,
            _phantom: PhantomData,
        }
    }
}

// Build method only available once a start URL is set
impl ScrapeConfigBuilder<WithStartUrl> {
    /// Queue an additional seed URL
    #[must_use]
    pub fn start_url(mut self, url: impl Into<String>) -> Self {
        self.config.start_urls.push(normalize_start_url(&url.into()));
        self
    }

    pub fn build(self) -> Result<ScrapeConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
