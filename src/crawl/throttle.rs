//! Per-handler, per-site request pacing
//!
//! Every navigation and HTTP request issued on behalf of a handler waits for
//! the slot of that handler on the target's registrable domain. Slots are
//! independent; there is no global limit, so the generic handler serving
//! several unrelated sites paces each site on its own.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::crawl_types::FailureKind;
use crate::errors::ExtractResult;
use crate::run::RunGuard;
use crate::utils::{host_of, registrable_domain};

/// Fixed inter-request delay keyed by handler name and target site
#[derive(Debug)]
pub struct HandlerThrottle {
    delay: Duration,
    last_request: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl HandlerThrottle {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: DashMap::new(),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Slot key for `handler` requesting `url`
    #[must_use]
    pub fn key(handler: &str, url: &str) -> String {
        let site = host_of(url).map_or_else(|| url.to_string(), |host| registrable_domain(&host));
        format!("{handler}@{site}")
    }

    /// Wait until `handler` may issue its next request to `url`'s site, then
    /// claim the slot.
    ///
    /// Concurrent callers for the same handler and site are served one at a
    /// time.
    pub async fn acquire(&self, handler: &str, url: &str, guard: &RunGuard) -> ExtractResult<()> {
        let slot = self
            .last_request
            .entry(Self::key(handler, url))
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut last = slot.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            let now = Instant::now();
            if ready_at > now {
                guard.sleep(ready_at - now).await?;
            }
        }
        guard.check()?;
        *last = Some(Instant::now());
        Ok(())
    }

    /// Backoff before retry number `attempt` (1-based) of a failed request
    #[must_use]
    pub fn retry_delay(&self, attempt: u8, kind: FailureKind) -> Duration {
        let base = self.delay.max(Duration::from_millis(250));
        base.mul_f64(f64::from(attempt.max(1)) * kind.delay_multiplier())
    }
}
