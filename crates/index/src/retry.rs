//! Exponential backoff for transient backend failures.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::StoreError;

/// Retry policy applied at the store boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Multiplier between consecutive delays.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries; the first error is final.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry `attempt` (1-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = self.base_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis(ms.min(self.max_delay.as_millis() as f64) as u64)
    }
}

/// Run `op`, retrying transient [`StoreError::Unavailable`] failures.
///
/// Non-transient errors and exhausted retries propagate to the caller, which
/// treats them as fatal.
pub fn with_backoff<T, F>(cfg: &RetryConfig, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Result<T, StoreError>,
{
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < cfg.max_retries => {
                attempt += 1;
                let delay = cfg.delay(attempt);
                warn!(%err, attempt, ?delay, "backend unavailable, backing off");
                thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}
