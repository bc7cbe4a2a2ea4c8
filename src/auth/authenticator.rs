//! Establishing an authenticated browser session
//!
//! Attempts, in order: a persisted session, cookie injection, then form login.
//! Each attempt is confirmed with a DOM probe. A probe that finds neither a
//! logged-in marker nor a login form is inconclusive; after cookie injection
//! that counts as success (`cookie-optimistic`), because many sites render no
//! stable account marker for injected sessions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::credentials::{Credential, LoginCredentials, StepAction};
use super::session_store::SessionStore;
use crate::browser::{BrowserSession, with_operation_timeout};
use crate::errors::{ExtractError, ExtractResult};
use crate::pipeline::RunLog;
use crate::run::RunGuard;
use crate::utils::{
    DEFAULT_LOGIN_STEP_DELAY_MS, DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
    DEFAULT_PROBE_TIMEOUT_MS,
};

const STAGE: &str = "auth";

/// Elements that only render for a signed-in user
pub const DEFAULT_SUCCESS_SELECTORS: &[&str] = &[
    ".logged-in",
    ".user-avatar",
    ".account-menu",
    "[data-testid=\"user-menu\"]",
    ".user-profile",
    "a[href*=\"logout\"]",
    "a[href*=\"signout\"]",
];

/// Elements that indicate a login form is being shown
pub const DEFAULT_LOGIN_FORM_SELECTORS: &[&str] = &[
    "form[action*=\"login\"]",
    "form[action*=\"signin\"]",
    "#login-form",
    ".login-form",
    "input[type=\"password\"]",
];

const DEFAULT_USERNAME_SELECTORS: &[&str] = &[
    "input[name=\"username\"]",
    "input[name=\"email\"]",
    "input[type=\"email\"]",
    "input[name=\"login\"]",
    "#username",
    "#email",
];

const DEFAULT_PASSWORD_SELECTORS: &[&str] = &["input[type=\"password\"]", "#password"];

const DEFAULT_SUBMIT_SELECTORS: &[&str] = &[
    "button[type=\"submit\"]",
    "input[type=\"submit\"]",
    "#login-button",
];

/// How the session ended up authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    StoredSession,
    Cookie,
    CookieOptimistic,
    Form,
    None,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StoredSession => "stored-session",
            Self::Cookie => "cookie",
            Self::CookieOptimistic => "cookie-optimistic",
            Self::Form => "form",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Outcome of an authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub success: bool,
    pub method: AuthMethod,
}

impl AuthResult {
    #[must_use]
    pub fn ok(method: AuthMethod) -> Self {
        Self {
            success: true,
            method,
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            success: false,
            method: AuthMethod::None,
        }
    }
}

/// What the DOM says about the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    LoggedIn,
    LoggedOut,
    Inconclusive,
}

/// Drives the stored-session / cookie / form login sequence
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    probe_timeout: Duration,
    operation_timeout: Duration,
    navigation_timeout: Duration,
    session_store: Option<SessionStore>,
}

impl Default for SessionAuthenticator {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            navigation_timeout: Duration::from_secs(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
            session_store: None,
        }
    }
}

impl SessionAuthenticator {
    #[must_use]
    pub fn new(probe_timeout: Duration, operation_timeout: Duration, navigation_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            operation_timeout,
            navigation_timeout,
            session_store: None,
        }
    }

    /// Persist successful sessions into `store` and try them first next time
    #[must_use]
    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Authenticate `session` for `target`.
    ///
    /// Only cancellation and deadline expiry are returned as errors; every
    /// other failure yields `AuthResult { success: false, method: None }` and
    /// the caller continues unauthenticated.
    pub async fn authenticate(
        &self,
        session: &dyn BrowserSession,
        credential: &Credential,
        target: &str,
        guard: &RunGuard,
        log: &RunLog,
    ) -> ExtractResult<AuthResult> {
        guard.check()?;

        if let Some(result) = self.try_stored_session(session, credential, target, guard, log).await? {
            return Ok(result);
        }

        let mut cookie_probe = None;
        if credential.has_cookies() {
            cookie_probe = self.try_cookies(session, credential, target, guard, log).await?;
            match cookie_probe {
                Some(ProbeOutcome::LoggedIn) => {
                    self.persist(session, credential, log).await;
                    return Ok(AuthResult::ok(AuthMethod::Cookie));
                }
                Some(ProbeOutcome::Inconclusive) => {
                    log.info(STAGE, target, "Cookies injected; no login marker or form visible, assuming authenticated");
                    return Ok(AuthResult::ok(AuthMethod::CookieOptimistic));
                }
                Some(ProbeOutcome::LoggedOut) => {
                    log.warn(STAGE, target, "Injected cookies were rejected (login form visible)");
                }
                None => {}
            }
        }

        if let Some(login) = &credential.login {
            match self.form_login(session, credential, login, target, guard, log).await {
                Ok(ProbeOutcome::LoggedOut) => {
                    log.warn(STAGE, target, "Form login did not leave the login page");
                }
                Ok(_) => {
                    log.info(STAGE, target, "Form login succeeded");
                    self.persist(session, credential, log).await;
                    return Ok(AuthResult::ok(AuthMethod::Form));
                }
                Err(e) if e.is_stop() => return Err(e),
                Err(e) => {
                    log.warn(STAGE, target, format!("Form login failed: {e}"));
                }
            }
        } else if cookie_probe.is_none() {
            log.debug(STAGE, target, "No usable cookies or login credentials");
        }

        Ok(AuthResult::failed())
    }

    /// Probe the current page for logged-in / logged-out markers
    pub async fn probe(&self, session: &dyn BrowserSession, credential: &Credential) -> ProbeOutcome {
        let success: Vec<&str> = if credential.success_selectors.is_empty() {
            DEFAULT_SUCCESS_SELECTORS.to_vec()
        } else {
            credential.success_selectors.iter().map(String::as_str).collect()
        };
        for selector in success {
            if self.probe_selector(session, selector).await {
                return ProbeOutcome::LoggedIn;
            }
        }

        let login_form: Vec<&str> = if credential.login_form_selectors.is_empty() {
            DEFAULT_LOGIN_FORM_SELECTORS.to_vec()
        } else {
            credential.login_form_selectors.iter().map(String::as_str).collect()
        };
        for selector in login_form {
            if self.probe_selector(session, selector).await {
                return ProbeOutcome::LoggedOut;
            }
        }

        ProbeOutcome::Inconclusive
    }

    /// Timed-out or failed checks count as "not found"
    async fn probe_selector(&self, session: &dyn BrowserSession, selector: &str) -> bool {
        with_operation_timeout(session.is_visible(selector), self.probe_timeout, "probe")
            .await
            .unwrap_or(false)
    }

    async fn try_stored_session(
        &self,
        session: &dyn BrowserSession,
        credential: &Credential,
        target: &str,
        guard: &RunGuard,
        log: &RunLog,
    ) -> ExtractResult<Option<AuthResult>> {
        let Some(store) = &self.session_store else {
            return Ok(None);
        };
        let Some(stored) = store.load(&credential.domain).await else {
            return Ok(None);
        };

        if let Err(e) = self
            .timed(session.set_cookies(&stored.cookies), "restore_session_cookies")
            .await
        {
            log.warn(STAGE, target, format!("Failed to restore stored session: {e}"));
            return Ok(None);
        }
        if !self.navigate(session, target, guard, log).await? {
            return Ok(None);
        }

        match self.probe(session, credential).await {
            ProbeOutcome::LoggedOut => {
                log.info(STAGE, target, "Stored session is no longer valid; discarding");
                store.discard(&credential.domain).await;
                Ok(None)
            }
            _ => {
                log.info(STAGE, target, "Restored stored session");
                Ok(Some(AuthResult::ok(AuthMethod::StoredSession)))
            }
        }
    }

    /// Inject cookies and probe. `None` when injection or navigation failed.
    async fn try_cookies(
        &self,
        session: &dyn BrowserSession,
        credential: &Credential,
        target: &str,
        guard: &RunGuard,
        log: &RunLog,
    ) -> ExtractResult<Option<ProbeOutcome>> {
        if let Err(e) = with_operation_timeout(
            session.set_cookies(&credential.cookies),
            self.operation_timeout,
            "set_cookies",
        )
        .await
        {
            log.warn(STAGE, target, format!("Cookie injection failed: {e}"));
            return Ok(None);
        }
        log.debug(STAGE, target, format!("Injected {} cookies", credential.cookies.len()));

        if !self.navigate(session, target, guard, log).await? {
            return Ok(None);
        }
        Ok(Some(self.probe(session, credential).await))
    }

    async fn form_login(
        &self,
        session: &dyn BrowserSession,
        credential: &Credential,
        login: &LoginCredentials,
        target: &str,
        guard: &RunGuard,
        log: &RunLog,
    ) -> ExtractResult<ProbeOutcome> {
        let login_url = credential.login_url.as_deref().unwrap_or(target);
        session
            .navigate(login_url, guard.cap(self.navigation_timeout))
            .await?;

        if credential.login_steps.is_empty() {
            self.default_form_sequence(session, credential, login, guard).await?;
        } else {
            for (index, step) in credential.login_steps.iter().enumerate() {
                guard.check()?;
                log.debug(STAGE, target, format!("Login step {} ({:?})", index + 1, step.action));
                match step.action {
                    StepAction::Fill => {
                        let selector = step.selector.as_deref().ok_or_else(|| {
                            ExtractError::Config(format!("login step {} has no selector", index + 1))
                        })?;
                        let value = step.resolved_value(login).unwrap_or_default();
                        self.timed(session.fill(selector, &value), "fill").await?;
                    }
                    StepAction::Click => {
                        let selector = step.selector.as_deref().ok_or_else(|| {
                            ExtractError::Config(format!("login step {} has no selector", index + 1))
                        })?;
                        self.timed(session.click(selector), "click").await?;
                    }
                    StepAction::Wait => {
                        if let Some(selector) = step.selector.as_deref() {
                            self.wait_for_visible(session, selector, guard).await?;
                        }
                    }
                    StepAction::Navigate => {
                        let url = step.resolved_value(login).ok_or_else(|| {
                            ExtractError::Config(format!("login step {} has no URL", index + 1))
                        })?;
                        session.navigate(&url, guard.cap(self.navigation_timeout)).await?;
                    }
                }
                let delay = step.delay_ms.unwrap_or(DEFAULT_LOGIN_STEP_DELAY_MS);
                guard.sleep(Duration::from_millis(delay)).await?;
            }
        }

        if login_url != target {
            session.navigate(target, guard.cap(self.navigation_timeout)).await?;
        }
        Ok(self.probe(session, credential).await)
    }

    async fn default_form_sequence(
        &self,
        session: &dyn BrowserSession,
        credential: &Credential,
        login: &LoginCredentials,
        guard: &RunGuard,
    ) -> ExtractResult<()> {
        let username = self
            .pick_selector(session, credential.form.username.as_deref(), DEFAULT_USERNAME_SELECTORS)
            .await
            .ok_or_else(|| ExtractError::StrategyError {
                strategy: "form-login".into(),
                message: "no username field found".into(),
            })?;
        let password = self
            .pick_selector(session, credential.form.password.as_deref(), DEFAULT_PASSWORD_SELECTORS)
            .await
            .ok_or_else(|| ExtractError::StrategyError {
                strategy: "form-login".into(),
                message: "no password field found".into(),
            })?;

        self.timed(session.fill(&username, &login.username), "fill").await?;
        guard.sleep(Duration::from_millis(DEFAULT_LOGIN_STEP_DELAY_MS)).await?;
        self.timed(session.fill(&password, &login.password), "fill").await?;
        guard.sleep(Duration::from_millis(DEFAULT_LOGIN_STEP_DELAY_MS)).await?;

        match self
            .pick_selector(session, credential.form.submit.as_deref(), DEFAULT_SUBMIT_SELECTORS)
            .await
        {
            Some(submit) => self.timed(session.click(&submit), "click").await?,
            None => {
                self.timed(
                    session.evaluate(
                        "(() => { const f = document.querySelector('input[type=\"password\"]'); \
                         if (f && f.form) { f.form.submit(); } })()",
                    ),
                    "submit",
                )
                .await?;
            }
        }

        // Let the post-login redirect settle
        guard.sleep(Duration::from_secs(2)).await
    }

    /// Configured selector, else the first default that is visible
    async fn pick_selector(
        &self,
        session: &dyn BrowserSession,
        configured: Option<&str>,
        defaults: &[&str],
    ) -> Option<String> {
        if let Some(selector) = configured {
            return Some(selector.to_string());
        }
        for selector in defaults {
            if self.probe_selector(session, selector).await {
                return Some((*selector).to_string());
            }
        }
        None
    }

    async fn wait_for_visible(
        &self,
        session: &dyn BrowserSession,
        selector: &str,
        guard: &RunGuard,
    ) -> ExtractResult<()> {
        let attempts = (self.operation_timeout.as_millis() / 250).max(1);
        for _ in 0..attempts {
            if self.probe_selector(session, selector).await {
                return Ok(());
            }
            guard.sleep(Duration::from_millis(250)).await?;
        }
        Err(ExtractError::OperationTimeout {
            operation: format!("wait for {selector}"),
            millis: u64::try_from(self.operation_timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn timed<F, T>(&self, operation: F, name: &str) -> ExtractResult<T>
    where
        F: std::future::Future<Output = ExtractResult<T>>,
    {
        with_operation_timeout(operation, self.operation_timeout, name).await
    }

    /// Navigate to `target`; `false` when navigation failed for a reason
    /// other than the run stopping.
    async fn navigate(
        &self,
        session: &dyn BrowserSession,
        target: &str,
        guard: &RunGuard,
        log: &RunLog,
    ) -> ExtractResult<bool> {
        guard.check()?;
        match session.navigate(target, guard.cap(self.navigation_timeout)).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_stop() => Err(e),
            Err(e) => {
                log.warn(STAGE, target, format!("Navigation during authentication failed: {e}"));
                Ok(false)
            }
        }
    }

    async fn persist(&self, session: &dyn BrowserSession, credential: &Credential, log: &RunLog) {
        let Some(store) = &self.session_store else {
            return;
        };
        match self.timed(session.cookies(), "read_session_cookies").await {
            Ok(cookies) if !cookies.is_empty() => {
                if let Err(e) = store.save(&credential.domain, cookies).await {
                    log.warn(STAGE, &credential.domain, format!("Failed to persist session: {e}"));
                }
            }
            Ok(_) => {}
            Err(e) => log.warn(STAGE, &credential.domain, format!("Failed to read session cookies: {e}")),
        }
    }
}
