//! Per-site credential configuration
//!
//! The credentials document is JSON, either `{"sites": {domain: entry}}` or a
//! bare `{domain: entry}` map. Field-name synonyms are resolved here, once, so
//! the authenticator only ever sees the canonical [`Credential`] shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::cookies::{CookieEntry, load_cookie_file};
use crate::errors::{ExtractError, ExtractResult};

const USERNAME_KEYS: &[&str] = &["username", "handle", "user", "email", "login"];
const PASSWORD_KEYS: &[&str] = &["password", "app_password", "appPassword", "secret", "pass"];

/// Username and password for form login
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Action performed by one declarative login step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// Type `value` into `selector`
    Fill,
    /// Click `selector`
    Click,
    /// Wait for `selector` to become visible, or just pause when absent
    Wait,
    /// Load `value` as a URL
    Navigate,
}

/// One step of a configured login sequence
///
/// `value` may contain `{username}` and `{password}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStep {
    #[serde(rename = "type", alias = "action")]
    pub action: StepAction,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

impl LoginStep {
    /// `value` with placeholders substituted
    #[must_use]
    pub fn resolved_value(&self, login: &LoginCredentials) -> Option<String> {
        self.value.as_ref().map(|v| {
            v.replace("{username}", &login.username)
                .replace("{password}", &login.password)
        })
    }
}

/// Selectors for the default (step-less) login form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSelectors {
    pub username: Option<String>,
    pub password: Option<String>,
    pub submit: Option<String>,
}

/// Resolved credential for one domain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credential {
    pub domain: String,
    pub cookies: Vec<CookieEntry>,
    pub login: Option<LoginCredentials>,
    pub login_url: Option<String>,
    pub login_steps: Vec<LoginStep>,
    pub form: FormSelectors,
    /// Overrides for the logged-in probe; empty uses the defaults
    pub success_selectors: Vec<String>,
    /// Overrides for the logged-out probe; empty uses the defaults
    pub login_form_selectors: Vec<String>,
}

impl Credential {
    #[must_use]
    pub fn has_cookies(&self) -> bool {
        !self.cookies.is_empty()
    }

    #[must_use]
    pub fn can_form_login(&self) -> bool {
        self.login.is_some()
    }
}

/// Credentials for every configured site, keyed by lower-cased domain
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    sites: HashMap<String, Credential>,
}

impl CredentialStore {
    /// Store with no credentials; every lookup misses
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a credentials document. Relative `cookie_file` paths resolve
    /// against the document's directory.
    pub fn from_file(path: &Path) -> ExtractResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::Config(format!(
                "Failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw, path.parent())
    }

    /// Parse a credentials document from a string
    pub fn from_json(raw: &str, base_dir: Option<&Path>) -> ExtractResult<Self> {
        let document: Value = serde_json::from_str(raw)?;
        let root = document
            .as_object()
            .ok_or_else(|| ExtractError::Config("credentials document must be an object".into()))?;
        let sites = match root.get("sites") {
            Some(Value::Object(sites)) => sites,
            Some(_) => {
                return Err(ExtractError::Config("'sites' must be an object".into()));
            }
            None => root,
        };

        let mut store = Self::default();
        for (domain, entry) in sites {
            let Some(entry) = entry.as_object() else {
                log::warn!(target: "mediascrape::auth", "Ignoring non-object credentials for {domain}");
                continue;
            };
            let credential = resolve_entry(domain, entry, base_dir)?;
            store.sites.insert(domain.trim().to_ascii_lowercase(), credential);
        }

        log::debug!(target: "mediascrape::auth", "Loaded credentials for {} site(s)", store.sites.len());
        Ok(store)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Credential for `domain` (a host, or a URL whose host is used).
    ///
    /// Tries the exact host, the host without `www.`, then each parent domain
    /// from the most to the least specific.
    #[must_use]
    pub fn load(&self, domain: &str) -> Option<Credential> {
        let host = url::Url::parse(domain)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| domain.to_string())
            .to_ascii_lowercase();

        if let Some(found) = self.sites.get(&host) {
            return Some(found.clone());
        }
        if let Some(bare) = host.strip_prefix("www.")
            && let Some(found) = self.sites.get(bare)
        {
            return Some(found.clone());
        }

        let labels: Vec<&str> = host.split('.').collect();
        (1..labels.len().saturating_sub(1))
            .map(|skip| labels[skip..].join("."))
            .find_map(|parent| self.sites.get(&parent).cloned())
    }
}

fn first_string(entry: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| entry.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(entry: &Map<String, Value>, key: &str) -> Vec<String> {
    match entry.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

fn resolve_entry(
    domain: &str,
    entry: &Map<String, Value>,
    base_dir: Option<&Path>,
) -> ExtractResult<Credential> {
    let mut cookies: Vec<CookieEntry> = match entry.get("cookies") {
        Some(value @ Value::Array(_)) => serde_json::from_value::<Vec<CookieEntry>>(value.clone())?
            .into_iter()
            .filter(CookieEntry::is_usable)
            .collect(),
        _ => Vec::new(),
    };
    if let Some(file) = first_string(entry, &["cookie_file", "cookies_file", "cookieFile"]) {
        let path = PathBuf::from(&file);
        let path = match base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        };
        cookies.extend(load_cookie_file(&path)?);
    }

    let login = match (
        first_string(entry, USERNAME_KEYS),
        first_string(entry, PASSWORD_KEYS),
    ) {
        (Some(username), Some(password)) => Some(LoginCredentials { username, password }),
        (Some(_), None) | (None, Some(_)) => {
            log::warn!(
                target: "mediascrape::auth",
                "Credentials for {domain} have only one of username/password; form login disabled"
            );
            None
        }
        (None, None) => None,
    };

    let login_steps = match entry.get("login_steps") {
        Some(steps @ Value::Array(_)) => serde_json::from_value(steps.clone())?,
        _ => Vec::new(),
    };

    Ok(Credential {
        domain: domain.to_ascii_lowercase(),
        cookies,
        login,
        login_url: first_string(entry, &["login_url", "loginUrl"]),
        login_steps,
        form: FormSelectors {
            username: first_string(entry, &["username_selector"]),
            password: first_string(entry, &["password_selector"]),
            submit: first_string(entry, &["submit_selector"]),
        },
        success_selectors: string_list(entry, "success_selectors"),
        login_form_selectors: string_list(entry, "login_form_selectors"),
    })
}
