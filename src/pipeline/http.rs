//! Throttled HTTP access for handlers
//!
//! Handlers issue API calls and page fetches through [`HttpClient`] so every
//! request waits for the handler's throttle slot and transient failures are
//! retried with backoff. Media URL verification also lives here.

use futures::StreamExt;
use reqwest::header::{ACCEPT, RANGE, REFERER};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::crawl::{FailureKind, HandlerThrottle};
use crate::errors::{ExtractError, ExtractResult};
use crate::run::RunGuard;

/// HTML documents larger than this are rejected
const MAX_PAGE_BYTES: usize = 16 * 1024 * 1024;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// reqwest client bound to a throttle, retry policy and run guard
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    throttle: Arc<HandlerThrottle>,
    handler: String,
    max_retries: u8,
    request_timeout: Duration,
    guard: Option<RunGuard>,
}

impl HttpClient {
    /// Build a client sending `user_agent` on every request
    pub fn new(
        user_agent: &str,
        throttle: Arc<HandlerThrottle>,
        max_retries: u8,
        request_timeout: Duration,
    ) -> ExtractResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .build()?;
        Ok(Self::with_client(client, throttle, max_retries, request_timeout))
    }

    #[must_use]
    pub fn with_client(
        client: Client,
        throttle: Arc<HandlerThrottle>,
        max_retries: u8,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            throttle,
            handler: String::from("default"),
            max_retries,
            request_timeout,
            guard: None,
        }
    }

    /// Same client, throttled under `handler` and stopped by `guard`
    #[must_use]
    pub fn scoped(&self, handler: &str, guard: &RunGuard) -> Self {
        Self {
            handler: handler.to_string(),
            guard: Some(guard.clone()),
            ..self.clone()
        }
    }

    /// The raw client for requests that need custom handling
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn throttle(&self) -> &Arc<HandlerThrottle> {
        &self.throttle
    }

    fn guard(&self) -> RunGuard {
        self.guard
            .clone()
            .unwrap_or_else(|| RunGuard::unbounded(crate::run::CancellationToken::new()))
    }

    /// Throttled request with bounded retry on transient failures
    async fn send(&self, method: Method, url: &str, accept: &str) -> ExtractResult<reqwest::Response> {
        let guard = self.guard();
        let mut attempt: u8 = 0;
        loop {
            self.throttle.acquire(&self.handler, url, &guard).await?;
            let result = self
                .client
                .request(method.clone(), url)
                .header(ACCEPT, accept)
                .timeout(guard.cap(self.request_timeout))
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);

            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => ExtractError::from(e),
            };

            let kind = FailureKind::classify(&error);
            let server_side = matches!(
                &error,
                ExtractError::Http(e) if e.status().is_some_and(|s| s.is_server_error())
            );
            let client_side = matches!(
                &error,
                ExtractError::Http(e) if e.status().is_some_and(|s| s.is_client_error() && s != StatusCode::TOO_MANY_REQUESTS)
            );
            if client_side || !(kind.is_retryable() || server_side) || attempt >= self.max_retries {
                return Err(error);
            }

            attempt += 1;
            let delay = self.throttle.retry_delay(attempt, kind);
            log::debug!(
                target: "mediascrape::http",
                "{} {url} failed ({error}), retry {attempt}/{} in {delay:?}",
                method,
                self.max_retries
            );
            guard.sleep(delay).await?;
        }
    }

    /// GET a page body as text, bounded by [`MAX_PAGE_BYTES`]
    pub async fn get_text(&self, url: &str) -> ExtractResult<String> {
        let response = self.send(Method::GET, url, HTML_ACCEPT).await?;

        if let Some(len) = response.content_length()
            && len > MAX_PAGE_BYTES as u64
        {
            return Err(ExtractError::Other(format!(
                "response too large: {len} bytes exceeds limit of {MAX_PAGE_BYTES} bytes"
            )));
        }

        let mut buffer = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if buffer.len() + chunk.len() > MAX_PAGE_BYTES {
                return Err(ExtractError::Other(format!(
                    "response exceeded size limit of {MAX_PAGE_BYTES} bytes"
                )));
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// GET and deserialize a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ExtractResult<T> {
        let response = self.send(Method::GET, url, "application/json").await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Confirm that `url` serves a resource.
    ///
    /// Sends HEAD first; servers that reject HEAD get a one-byte ranged GET.
    /// Not throttled and not retried.
    pub async fn verify(&self, url: &str, referer: Option<&str>, timeout: Duration) -> ExtractResult<()> {
        let guard = self.guard();
        guard.check()?;
        let timeout = guard.cap(timeout);

        let mut head = self.client.head(url).timeout(timeout);
        if let Some(referer) = referer {
            head = head.header(REFERER, referer);
        }
        let status = head.send().await?.status();
        if status.is_success() {
            return Ok(());
        }

        if matches!(
            status,
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::FORBIDDEN | StatusCode::NOT_IMPLEMENTED
        ) {
            let mut get = self
                .client
                .get(url)
                .header(RANGE, "bytes=0-0")
                .timeout(timeout);
            if let Some(referer) = referer {
                get = get.header(REFERER, referer);
            }
            let status = get.send().await?.status();
            if status.is_success() {
                return Ok(());
            }
            return Err(ExtractError::VerificationFailed {
                url: url.to_string(),
                reason: format!("ranged GET returned {status}"),
            });
        }

        Err(ExtractError::VerificationFailed {
            url: url.to_string(),
            reason: format!("HEAD returned {status}"),
        })
    }
}
