//! Retry with exponential backoff for transient failures

use std::time::Duration;

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Errors that can distinguish transient from permanent failures.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::http::HttpError {
    fn is_retryable(&self) -> bool {
        self.is_retryable()
    }
}

/// Retry a fallible operation with exponential backoff.
///
/// On retryable errors, logs the failure, sleeps, and retries up to
/// `max_retries`. Returns `Ok(T)` on first success, or the final `Err`
/// on exhaustion / non-retryable error.
pub fn retry_with_backoff<T, E: Retryable + std::fmt::Display>(
    label: &str,
    max_retries: u32,
    mut attempt_fn: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                log::debug!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                std::thread::sleep(backoff_duration(attempt));
            }
            Err(e) => {
                log::debug!("{label}: failed permanently: {e}");
                return Err(e);
            }
        }
    }
}
