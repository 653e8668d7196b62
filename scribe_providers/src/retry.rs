use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Delays between attempts. No delays means a single attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// One attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self { delays: Vec::new() }
    }

    #[must_use]
    pub const fn with_delays(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    #[must_use]
    pub fn from_secs(delays: &[u64]) -> Self {
        Self::with_delays(delays.iter().copied().map(Duration::from_secs).collect())
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.delays.len() + 1
    }
}

/// Retry an async operation, sleeping through `policy`'s delays between
/// attempts.
///
/// # Arguments
/// * `operation` - The async operation to retry
/// * `policy` - Delays before each retry
/// * `should_retry` - Errors for which this returns false are returned immediately
///
/// # Returns
/// The first success, or the last error once the delays run out
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    mut operation: F,
    policy: &RetryPolicy,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let total = policy.attempts();
    let mut delays = policy.delays.iter();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e) {
                    return Err(e);
                }
                let Some(delay) = delays.next() else {
                    return Err(e);
                };
                warn!(
                    "Request failed (attempt {attempt}/{total}): {e}. Retrying after {}ms...",
                    delay.as_millis()
                );
                sleep(*delay).await;
                attempt += 1;
            }
        }
    }
}
