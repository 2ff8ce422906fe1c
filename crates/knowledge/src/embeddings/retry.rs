//! Retry with exponential backoff for remote embedding calls.

use finagent_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// Maximum attempts for a failed request
pub(crate) const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
pub(crate) const INITIAL_BACKOFF_MS: u64 = 100;

/// Run `operation` up to `retries` times, sleeping `100ms * 2^attempt`
/// between attempts.
pub(crate) async fn with_retries<T, F, Fut>(retries: u32, mut operation: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    let mut last_error = None;

    while attempt < retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;

                if attempt < retries {
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    tracing::warn!(
                        "Embedding request failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt,
                        retries,
                        e,
                        backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::Llm("Unknown embedding error".to_string())))
}
