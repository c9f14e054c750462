//! Retry with exponential backoff and jitter.
//!
//! Used for idempotent operations only; payment capture in particular is
//! never retried. The delay for attempt `n` (zero-based) is
//! `min(base * 2^n + jitter, max)` where the jitter is a random fraction of
//! the base delay, so simultaneous callers do not resynchronize.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use skylark_core::config::ResilienceConfig;

/// Retry schedule for one class of operation.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Additional attempts after the first; 3 means up to 4 invocations.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Build from the application's resilience settings.
    pub fn from_settings(settings: &ResilienceConfig) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }

    /// Delay to sleep before retry number `attempt` (zero-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64;
        let exponential = base * 2f64.powi(attempt.min(16) as i32);
        let jitter = rand::random::<f64>() * base;
        let capped = (exponential + jitter).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Invoke `op` until it succeeds or the attempt budget is exhausted,
    /// sleeping the backoff delay between attempts. Returns the last error
    /// when every attempt fails.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    debug!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
