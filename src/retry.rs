use std::future::Future;
use std::time::Duration;

use crate::Result;

/// Bounded exponential backoff around a single fallible async operation.
///
/// The wrapper is agnostic to what the operation does; it only looks at
/// [`TriptychError::is_retryable`](crate::TriptychError::is_retryable) to
/// decide whether another attempt makes sense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Run `op` up to `max_attempts` times. `on_attempt(attempt, max)` is
    /// invoked before every attempt after the first; it is a notification
    /// hook, not a control point. A non-retryable failure propagates
    /// immediately; exhausting all attempts re-throws the last error.
    pub async fn execute<T, Op, Fut, Notify>(&self, mut op: Op, mut on_attempt: Notify) -> Result<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        Notify: FnMut(u32, u32),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            if attempt > 1 {
                on_attempt(attempt, max_attempts);
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() || attempt >= max_attempts => return Err(err),
                Err(err) => {
                    let delay = self.backoff_delay(attempt);
                    tracing::debug!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }

    /// Delay inserted after `failed_attempt` (1-indexed):
    /// `min(base_delay * 2^(failed_attempt - 1), max_delay)`.
    fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}
