//! Browser-exported cookie entries and Netscape cookie-jar export
//!
//! Accepts the JSON arrays produced by common cookie-export extensions
//! (`httpOnly`, `sameSite`, `expirationDate` spellings included) and writes the
//! tab-separated Netscape format external download tools consume.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use crate::errors::{ExtractError, ExtractResult};
use crate::utils::SESSION_COOKIE_EXPIRY;

/// `SameSite` attribute of a cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// A single cookie as exported from a browser or read back from a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, alias = "httpOnly")]
    pub http_only: bool,
    #[serde(
        default,
        alias = "sameSite",
        deserialize_with = "lenient_same_site",
        skip_serializing_if = "Option::is_none"
    )]
    pub same_site: Option<SameSite>,
    /// Expiry in seconds since the epoch; `None` for session cookies
    #[serde(
        default,
        alias = "expirationDate",
        alias = "expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

/// Export tools disagree on spelling (`no_restriction`, `unspecified`, mixed
/// case); anything unrecognised is treated as absent rather than an error.
fn lenient_same_site<'de, D>(deserializer: D) -> Result<Option<SameSite>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| match s.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" | "no_restriction" => Some(SameSite::None),
            _ => None,
        }))
}

impl CookieEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            secure: false,
            http_only: false,
            same_site: None,
            expires: None,
        }
    }

    /// Entries without a name or a domain cannot be replayed
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.name.is_empty() && !self.domain.is_empty()
    }

    /// Expiry as whole seconds, session cookies mapped to the far-future sentinel
    #[must_use]
    pub fn expiry_secs(&self) -> i64 {
        match self.expires {
            Some(secs) if secs > 0.0 => secs as i64,
            _ => SESSION_COOKIE_EXPIRY,
        }
    }
}

/// Parse a browser-exported JSON cookie array, dropping unusable entries
pub fn parse_cookie_json(raw: &str) -> ExtractResult<Vec<CookieEntry>> {
    let entries: Vec<CookieEntry> = serde_json::from_str(raw)?;
    Ok(entries.into_iter().filter(CookieEntry::is_usable).collect())
}

/// Read a browser-exported JSON cookie file
pub fn load_cookie_file(path: &Path) -> ExtractResult<Vec<CookieEntry>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ExtractError::Config(format!("Failed to read cookie file {}: {e}", path.display()))
    })?;
    parse_cookie_json(&raw)
}

/// Render cookies in Netscape cookie-jar format
#[must_use]
pub fn to_netscape(cookies: &[CookieEntry]) -> String {
    let mut out = String::from("# Netscape HTTP Cookie File\n");
    for cookie in cookies.iter().filter(|c| c.is_usable()) {
        let include_subdomains = if cookie.domain.starts_with('.') { "TRUE" } else { "FALSE" };
        let secure = if cookie.secure { "TRUE" } else { "FALSE" };
        let path = if cookie.path.is_empty() { "/" } else { cookie.path.as_str() };
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            cookie.domain,
            include_subdomains,
            path,
            secure,
            cookie.expiry_secs(),
            cookie.name,
            cookie.value
        );
    }
    out
}

/// Write cookies to `path` in Netscape format, creating parent directories
pub async fn write_netscape_file(path: &Path, cookies: &[CookieEntry]) -> ExtractResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, to_netscape(cookies)).await?;
    log::debug!(target: "mediascrape::auth", "Wrote {} cookies to {}", cookies.len(), path.display());
    Ok(())
}
