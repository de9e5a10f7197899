//! Retry logic for provider requests.
//!
//! Transient errors are retried with exponential backoff; every other error
//! is returned on the first occurrence.

use std::future::Future;

use tokio::time::sleep;
use tracing::warn;

use crate::endpoint::RetryConfig;
use crate::error::Result;

/// Execute an async operation, retrying transient failures.
///
/// `config.max_attempts` bounds the total number of calls, so a value of 1
/// disables retries. Returns the last error when attempts run out.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                let backoff = config.backoff_duration(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts,
                    error = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "Transient error, backing off"
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
