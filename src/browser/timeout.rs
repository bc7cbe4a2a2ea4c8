//! Timeout utilities for browser operations
//!
//! Every call into the browser is bounded so a stalled page can never hang a
//! worker.

use std::future::Future;
use std::time::Duration;

use crate::errors::{ExtractError, ExtractResult};

/// Wrap a browser operation with an explicit timeout
///
/// # Returns
/// * `Ok(T)` - Operation completed successfully
/// * `Err(OperationTimeout)` - The bound was reached
/// * `Err(_)` - The operation itself failed
pub async fn with_operation_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &str,
) -> ExtractResult<T>
where
    F: Future<Output = ExtractResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(ExtractError::OperationTimeout {
            operation: operation_name.to_string(),
            millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Wrap a navigation with its timeout, reported as `NavigationTimeout`
pub async fn with_navigation_timeout<F, T>(
    operation: F,
    timeout: Duration,
    url: &str,
) -> ExtractResult<T>
where
    F: Future<Output = ExtractResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(ExtractError::NavigationTimeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}
