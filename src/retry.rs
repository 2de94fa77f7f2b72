use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Classification of a failed attempt.
pub enum Retry {
    /// Terminal; surface immediately.
    No,
    /// Transient; retry after the computed backoff.
    Yes,
    /// Transient with a server-requested minimum delay (Retry-After).
    After(Duration),
}

/// Exponential backoff delay for a zero-based attempt index: base * 2^attempt.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Run `attempt_fn` up to `max_attempts` times, sleeping between attempts.
/// Returns the value of the first success, or the number of attempts made
/// together with the last error.
pub async fn with_backoff<T, E, F, Fut, C>(
    op: &str,
    max_attempts: u32,
    base: Duration,
    classify: C,
    mut attempt_fn: F,
) -> Result<T, (u32, E)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> Retry,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        match attempt_fn(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                let attempts_made = attempt + 1;
                if attempts_made >= max_attempts {
                    return Err((attempts_made, e));
                }
                let delay = match classify(&e) {
                    Retry::No => return Err((attempts_made, e)),
                    Retry::Yes => backoff_delay(base, attempt),
                    Retry::After(min) => std::cmp::max(backoff_delay(base, attempt), min),
                };
                warn!(
                    "{} attempt {}/{} failed: {}; retrying in {:?}",
                    op, attempts_made, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt = attempts_made;
            }
        }
    }
}
