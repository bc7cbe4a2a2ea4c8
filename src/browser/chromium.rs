//! chromiumoxide-backed browser sessions
//!
//! One browser process is shared by the run; every session gets its own
//! browser context so cookies and storage never leak between workers.

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use log::{debug, warn};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::setup::{apply_stealth_measures, launch_browser, shutdown_browser};
use super::timeout::with_navigation_timeout;
use super::{BrowserSession, SessionFactory};
use crate::auth::{CookieEntry, SameSite};
use crate::config::ScrapeConfig;
use crate::errors::{ExtractError, ExtractResult};

fn cdp_err(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Browser(e.to_string())
}

/// JS string literal for embedding a selector into a script
fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// A page inside a dedicated browser context
pub struct ChromiumSession {
    page: Page,
}

impl ChromiumSession {
    #[must_use]
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Underlying page, for handlers that need raw CDP access
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> ExtractResult<()> {
        with_navigation_timeout(
            async {
                self.page.goto(url).await.map_err(cdp_err)?;
                self.page.wait_for_navigation().await.map_err(cdp_err)?;
                Ok(())
            },
            timeout,
            url,
        )
        .await
    }

    async fn current_url(&self) -> ExtractResult<String> {
        Ok(self.page.url().await.map_err(cdp_err)?.unwrap_or_default())
    }

    async fn content(&self) -> ExtractResult<String> {
        self.page.content().await.map_err(cdp_err)
    }

    async fn evaluate(&self, script: &str) -> ExtractResult<serde_json::Value> {
        let result = self.page.evaluate(script).await.map_err(cdp_err)?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn set_cookies(&self, cookies: &[CookieEntry]) -> ExtractResult<()> {
        let params = cookies
            .iter()
            .filter(|c| c.is_usable())
            .map(to_cookie_param)
            .collect::<ExtractResult<Vec<_>>>()?;
        if params.is_empty() {
            return Ok(());
        }
        self.page.set_cookies(params).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn cookies(&self) -> ExtractResult<Vec<CookieEntry>> {
        let cookies = self.page.get_cookies().await.map_err(cdp_err)?;
        Ok(cookies.into_iter().map(from_cdp_cookie).collect())
    }

    async fn is_visible(&self, selector: &str) -> ExtractResult<bool> {
        let script = format!(
            r"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }})()",
            sel = js_str(selector)
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn fill(&self, selector: &str, value: &str) -> ExtractResult<()> {
        let element = self.page.find_element(selector).await.map_err(cdp_err)?;
        self.evaluate(&format!(
            "(() => {{ const el = document.querySelector({}); if (el) el.value = ''; }})()",
            js_str(selector)
        ))
        .await?;
        element.click().await.map_err(cdp_err)?;
        element.type_str(value).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> ExtractResult<()> {
        let element = self.page.find_element(selector).await.map_err(cdp_err)?;
        element.click().await.map_err(cdp_err)?;
        Ok(())
    }

    async fn count(&self, selector: &str) -> ExtractResult<usize> {
        let script = format!("document.querySelectorAll({}).length", js_str(selector));
        let value = self.evaluate(&script).await?;
        Ok(value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0))
    }

    async fn scroll_height(&self) -> ExtractResult<u64> {
        let value = self
            .evaluate("document.body ? document.body.scrollHeight : 0")
            .await?;
        Ok(value.as_u64().unwrap_or(0))
    }

    async fn scroll_to_bottom(&self) -> ExtractResult<()> {
        self.evaluate("window.scrollTo(0, document.body ? document.body.scrollHeight : 0)")
            .await?;
        Ok(())
    }

    async fn links(&self) -> ExtractResult<Vec<String>> {
        let value = self
            .evaluate("Array.from(document.querySelectorAll('a[href]')).map(a => a.href)")
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn close(&self) -> ExtractResult<()> {
        self.page.clone().close().await.map_err(cdp_err)
    }
}

fn to_cookie_param(cookie: &CookieEntry) -> ExtractResult<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(same_site) = cookie.same_site {
        builder = builder.same_site(match same_site {
            SameSite::Strict => CookieSameSite::Strict,
            SameSite::Lax => CookieSameSite::Lax,
            SameSite::None => CookieSameSite::None,
        });
    }
    if let Some(expires) = cookie.expires.filter(|e| *e > 0.0) {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    builder.build().map_err(ExtractError::Browser)
}

fn from_cdp_cookie(cookie: Cookie) -> CookieEntry {
    CookieEntry {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        secure: cookie.secure,
        http_only: cookie.http_only,
        same_site: cookie.same_site.map(|s| match s {
            CookieSameSite::Strict => SameSite::Strict,
            CookieSameSite::Lax => SameSite::Lax,
            CookieSameSite::None => SameSite::None,
        }),
        expires: (!cookie.session && cookie.expires > 0.0).then_some(cookie.expires),
    }
}

struct LaunchedBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
}

/// Launches one Chrome process and hands out isolated sessions on it
pub struct ChromiumSessionFactory {
    inner: tokio::sync::Mutex<Option<LaunchedBrowser>>,
    contexts: Mutex<Vec<BrowserContextId>>,
}

impl ChromiumSessionFactory {
    /// Find or download Chrome and launch it per `config`
    pub async fn launch(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let (browser, handler_task, user_data_dir) = launch_browser(
            config.headless(),
            config.user_agent(),
            config.chrome_data_dir().map(PathBuf::from),
        )
        .await?;
        Ok(Self {
            inner: tokio::sync::Mutex::new(Some(LaunchedBrowser {
                browser,
                handler_task,
                user_data_dir,
            })),
            contexts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open_session(&self) -> ExtractResult<Box<dyn BrowserSession>> {
        let guard = self.inner.lock().await;
        let launched = guard
            .as_ref()
            .ok_or_else(|| ExtractError::Browser("browser already shut down".into()))?;

        let context_id = launched
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(cdp_err)?
            .result
            .browser_context_id;
        self.contexts.lock().push(context_id.clone());

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id)
            .build()
            .map_err(ExtractError::Browser)?;
        let page = launched.browser.new_page(target).await.map_err(cdp_err)?;
        drop(guard);

        page.execute(
            SetDeviceMetricsOverrideParams::builder()
                .width(1920)
                .height(1080)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(ExtractError::Browser)?,
        )
        .await
        .map_err(cdp_err)?;

        if let Err(e) = apply_stealth_measures(&page).await {
            // Stealth is best effort; the session is still usable
            warn!(target: "mediascrape::browser", "Failed to apply stealth measures: {e}");
        }

        debug!(target: "mediascrape::browser", "Opened isolated browser session");
        Ok(Box::new(ChromiumSession::new(page)))
    }

    async fn shutdown(&self) -> ExtractResult<()> {
        let Some(launched) = self.inner.lock().await.take() else {
            return Ok(());
        };

        let contexts: Vec<BrowserContextId> = std::mem::take(&mut *self.contexts.lock());
        for id in contexts {
            if let Err(e) = launched
                .browser
                .execute(DisposeBrowserContextParams::new(id))
                .await
            {
                debug!(target: "mediascrape::browser", "Failed to dispose browser context: {e}");
            }
        }

        let errors = shutdown_browser(
            launched.browser,
            launched.handler_task,
            &launched.user_data_dir,
        )
        .await;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ExtractError::Browser(errors.join("; ")))
        }
    }
}
