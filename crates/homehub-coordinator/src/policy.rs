//! Retry policy applied by coordinator clients.
//!
//! The coordinator never retries on its own. Activities that call it on a
//! timer (the poller, scheduled jobs) share one [`RetryPolicy`] instead of
//! each carrying its own loop and constants.

use crate::error::{CoordinatorError, Result};
use crate::signal::ShutdownSignal;
use homehub_core::constants::{DEFAULT_POLL_FAILURE_BACKOFF_MS, DEFAULT_POLL_INTERVAL_MS};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Timing rules for periodic and retried coordinator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between rounds after a success.
    pub interval: Duration,
    /// Delay after a failure, before the next attempt or round.
    pub failure_backoff: Duration,
    /// Attempts per call in [`RetryPolicy::retry`], including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            failure_backoff: Duration::from_millis(DEFAULT_POLL_FAILURE_BACKOFF_MS),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next round, given whether the last one succeeded.
    #[must_use]
    pub fn next_delay(&self, succeeded: bool) -> Duration {
        if succeeded {
            self.interval
        } else {
            self.failure_backoff
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or runs
    /// out of attempts.
    ///
    /// Only [`ErrorKind::DeviceUnavailable`](crate::ErrorKind) is retried.
    /// The backoff sleep ends early on shutdown.
    ///
    /// # Errors
    ///
    /// Returns the last error from `op`, or `ShuttingDown` if shutdown was
    /// requested during a backoff.
    pub async fn retry<T, F, Fut>(&self, shutdown: &ShutdownSignal, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.kind().is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = homehub_core::duration_ms(self.failure_backoff),
                        error = %e,
                        "Retrying after failure"
                    );
                    if !shutdown.sleep(self.failure_backoff).await {
                        return Err(CoordinatorError::ShuttingDown);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
