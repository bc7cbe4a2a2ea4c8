//! Persisted browser sessions
//!
//! After a successful login the session's cookies are written to
//! `<dir>/<domain>.json` so the next run can skip the login form. Sessions
//! carry their own expiry and are ignored (and removed) once stale.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::cookies::CookieEntry;
use crate::errors::ExtractResult;

/// Cookies captured from an authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub domain: String,
    pub cookies: Vec<CookieEntry>,
    pub saved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Directory of per-domain session files
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
    expiry: ChronoDuration,
}

impl SessionStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, expiry_hours: i64) -> Self {
        Self {
            dir: dir.into(),
            expiry: ChronoDuration::hours(expiry_hours.max(0)),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, domain: &str) -> PathBuf {
        let safe: String = domain
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// Live session for `domain`, if one was saved and has not expired
    pub async fn load(&self, domain: &str) -> Option<StoredSession> {
        let path = self.path_for(domain);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        let session: StoredSession = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                log::warn!(target: "mediascrape::auth", "Discarding unreadable session {}: {e}", path.display());
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };
        if session.is_expired() {
            log::debug!(target: "mediascrape::auth", "Stored session for {domain} expired at {}", session.expires_at);
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }
        Some(session)
    }

    /// Persist `cookies` as the session for `domain`
    pub async fn save(&self, domain: &str, cookies: Vec<CookieEntry>) -> ExtractResult<StoredSession> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let now = Utc::now();
        let session = StoredSession {
            domain: domain.to_ascii_lowercase(),
            cookies,
            saved_at: now,
            expires_at: now + self.expiry,
        };
        let json = serde_json::to_string_pretty(&session)?;
        tokio::fs::write(self.path_for(domain), json).await?;
        log::debug!(target: "mediascrape::auth", "Saved session for {domain} ({} cookies)", session.cookies.len());
        Ok(session)
    }

    /// Forget the session for `domain`
    pub async fn discard(&self, domain: &str) {
        if let Err(e) = tokio::fs::remove_file(self.path_for(domain)).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!(target: "mediascrape::auth", "Failed to remove session for {domain}: {e}");
        }
    }
}
